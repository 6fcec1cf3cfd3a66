//! # Reference Data Seeder
//!
//! Loads the AFIP reference data every Argentine installation needs before
//! the first invoice can be issued.
//!
//! ## Usage
//! ```bash
//! # Use erp.toml from the platform config dir (or defaults)
//! cargo run -p erp-db --bin seed
//!
//! # Explicit config file
//! cargo run -p erp-db --bin seed -- --config ./erp.toml
//!
//! # Override the database path
//! cargo run -p erp-db --bin seed -- --db ./data/erp.db
//! ```
//!
//! ## Seeded Data
//! - Fiscal positions (IVA conditions): Responsable Inscripto, Exento,
//!   Consumidor Final, Monotributista
//! - VAT rates: 0 %, 10.5 %, 21 %, 27 %
//! - Invoice types: A/B/C bills, debit notes and credit notes
//! - Concept types: Productos, Servicios, Productos y Servicios
//! - The issuer / invoice type / receiver allow-list
//!
//! Every row is looked up before it is created, so running the seeder
//! again leaves existing data untouched.

use std::collections::HashMap;
use std::env;
use std::path::PathBuf;

use erp_core::{
    Fraction, InvoiceTypeClass, NewConceptType, NewFiscalPosition, NewInvoiceType, NewVat,
};
use erp_db::logging::init_tracing;
use erp_db::{Database, DbConfig, DbResult, ErpConfig};
use tracing::info;

/// Fiscal positions with their AFIP IVA condition codes.
const FISCAL_POSITIONS: &[(&str, &str)] = &[
    ("Responsable Inscripto", "1"),
    ("Exento", "4"),
    ("Consumidor Final", "5"),
    ("Monotributista", "6"),
];

/// VAT rates: name, AFIP alícuota id, basis points.
const VATS: &[(&str, &str, u32)] = &[
    ("IVA 0%", "3", 0),
    ("IVA 10.5%", "4", 1050),
    ("IVA 21%", "5", 2100),
    ("IVA 27%", "6", 2700),
];

/// Invoice types: name, class, AFIP comprobante code, letter.
const INVOICE_TYPES: &[(&str, InvoiceTypeClass, &str, char)] = &[
    ("Factura A", InvoiceTypeClass::Bill, "1", 'A'),
    ("Nota de Débito A", InvoiceTypeClass::Debit, "2", 'A'),
    ("Nota de Crédito A", InvoiceTypeClass::Credit, "3", 'A'),
    ("Factura B", InvoiceTypeClass::Bill, "6", 'B'),
    ("Nota de Débito B", InvoiceTypeClass::Debit, "7", 'B'),
    ("Nota de Crédito B", InvoiceTypeClass::Credit, "8", 'B'),
    ("Factura C", InvoiceTypeClass::Bill, "11", 'C'),
    ("Nota de Débito C", InvoiceTypeClass::Debit, "12", 'C'),
    ("Nota de Crédito C", InvoiceTypeClass::Credit, "13", 'C'),
];

const CONCEPT_TYPES: &[(&str, &str)] = &[
    ("Productos", "1"),
    ("Servicios", "2"),
    ("Productos y Servicios", "3"),
];

/// Which letter each issuer may address to which receivers.
const ALLOW_LIST: &[(&str, char, &[&str])] = &[
    (
        "Responsable Inscripto",
        'A',
        &["Responsable Inscripto", "Monotributista"],
    ),
    ("Responsable Inscripto", 'B', &["Exento", "Consumidor Final"]),
    (
        "Monotributista",
        'C',
        &["Responsable Inscripto", "Exento", "Consumidor Final", "Monotributista"],
    ),
    (
        "Exento",
        'C',
        &["Responsable Inscripto", "Exento", "Consumidor Final", "Monotributista"],
    ),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Parse command line arguments
    let args: Vec<String> = env::args().collect();

    let mut config_path: Option<PathBuf> = None;
    let mut db_path: Option<PathBuf> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--config" | "-c" => {
                if i + 1 < args.len() {
                    config_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("ERP Invoicing Reference Data Seeder");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -c, --config <PATH>  Config file (default: erp.toml in the config dir)");
                println!("  -d, --db <PATH>      Database file path (overrides the config)");
                println!("  -h, --help           Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    let mut config = ErpConfig::load_or_default(config_path);
    if let Some(path) = db_path {
        config.database.path = path;
    }
    init_tracing(&config.logging.filter);

    println!("🌱 ERP Invoicing Reference Data Seeder");
    println!("======================================");
    println!("Database: {}", config.database.path.display());
    println!();

    let db = Database::new(DbConfig::from(&config.database)).await?;
    println!("✓ Connected to database");

    let positions = seed_fiscal_positions(&db).await?;
    println!("✓ Fiscal positions: {}", positions.len());

    let vats = seed_vats(&db).await?;
    println!("✓ VAT rates: {}", vats);

    let letters = seed_invoice_types(&db).await?;
    println!("✓ Invoice types: {}", letters.values().map(Vec::len).sum::<usize>());

    let concepts = seed_concept_types(&db).await?;
    println!("✓ Concept types: {}", concepts);

    let rules = seed_allow_list(&db, &positions, &letters).await?;
    println!("✓ Allow-list rules: {}", rules);

    db.close().await;

    println!();
    println!("✓ Seed complete!");

    Ok(())
}

/// Returns fiscal position ids by name.
async fn seed_fiscal_positions(db: &Database) -> DbResult<HashMap<&'static str, String>> {
    let parties = db.parties();
    let mut ids = HashMap::new();

    for (name, code) in FISCAL_POSITIONS {
        let position = match parties.get_fiscal_position_by_name(name).await? {
            Some(existing) => existing,
            None => {
                info!(name = %name, "Seeding fiscal position");
                parties
                    .create_fiscal_position(NewFiscalPosition {
                        name: name.to_string(),
                        code: code.to_string(),
                    })
                    .await?
            }
        };
        ids.insert(*name, position.id);
    }

    Ok(ids)
}

async fn seed_vats(db: &Database) -> DbResult<usize> {
    let catalog = db.catalog();

    for (name, code, bps) in VATS {
        if catalog.get_vat_by_name(name).await?.is_none() {
            info!(name = %name, bps = bps, "Seeding VAT");
            catalog
                .create_vat(NewVat {
                    name: name.to_string(),
                    code: code.to_string(),
                    tax: Fraction::from_bps(*bps),
                })
                .await?;
        }
    }

    Ok(VATS.len())
}

/// Returns invoice type ids grouped by letter.
async fn seed_invoice_types(db: &Database) -> DbResult<HashMap<char, Vec<String>>> {
    let catalog = db.catalog();
    let mut by_letter: HashMap<char, Vec<String>> = HashMap::new();

    for (name, class, code, letter) in INVOICE_TYPES {
        let invoice_type = match catalog.get_invoice_type_by_code(code).await? {
            Some(existing) => existing,
            None => {
                info!(name = %name, code = %code, "Seeding invoice type");
                catalog
                    .create_invoice_type(NewInvoiceType {
                        name: name.to_string(),
                        invoice_type_class: *class,
                        code: code.to_string(),
                    })
                    .await?
            }
        };
        by_letter.entry(*letter).or_default().push(invoice_type.id);
    }

    Ok(by_letter)
}

async fn seed_concept_types(db: &Database) -> DbResult<usize> {
    let invoices_ar = db.invoices_ar();

    for (name, code) in CONCEPT_TYPES {
        if invoices_ar.get_concept_type_by_code(code).await?.is_none() {
            info!(name = %name, "Seeding concept type");
            invoices_ar
                .create_concept_type(NewConceptType {
                    name: name.to_string(),
                    code: code.to_string(),
                })
                .await?;
        }
    }

    Ok(CONCEPT_TYPES.len())
}

async fn seed_allow_list(
    db: &Database,
    positions: &HashMap<&'static str, String>,
    letters: &HashMap<char, Vec<String>>,
) -> DbResult<usize> {
    let catalog = db.catalog();
    let mut count = 0;

    for (issuer, letter, receivers) in ALLOW_LIST {
        let Some(issuer_id) = positions.get(issuer) else {
            continue;
        };
        let Some(type_ids) = letters.get(letter) else {
            continue;
        };

        for receiver in receivers.iter() {
            let Some(receiver_id) = positions.get(receiver) else {
                continue;
            };
            for type_id in type_ids {
                catalog
                    .allow_invoice_type(issuer_id, type_id, receiver_id)
                    .await?;
                count += 1;
            }
        }
    }

    Ok(count)
}
