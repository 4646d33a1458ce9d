//! # Alpha Insights
//!
//! Load twelve monthly sales spreadsheets into a local key-value store and ask
//! natural-language questions about them through the Gemini API.
//!
//! ## Core Concepts
//!
//! - **Slug**: canonical lowercase, underscore-delimited column name derived from a
//!   spreadsheet header (`"Preço_Unitário"` → `"preco_unitario"`)
//! - **Month Dataset**: every row uploaded for one calendar month, stored under
//!   `sales_<index>` (normalized) and `sales_<index>_original` (as read)
//! - **Aggregated Record**: a row tagged with `mes` and `mes_index`, used to reason
//!   across months
//!
//! ## Example
//!
//! ```rust,ignore
//! use alpha_insights::*;
//!
//! let mut store = JsonFileStore::open("alpha_insights.json")?;
//! let january = Month::new(0)?;
//! let report = ingest_path(&mut store, january, "vendas_janeiro.xlsx".as_ref())?;
//! println!("{} rows, {} columns", report.rows, report.columns);
//!
//! let rows = aggregate_all(&store)?;
//! let prompt = build_prompt(&rows, "Qual produto vendeu mais?", &loaded_months(&store)?)?;
//!
//! let settings = Settings::load(&mut store)?;
//! let answer = GeminiClient::new()
//!     .ask(&prompt, settings.require_api_key()?)
//!     .await?;
//! ```

pub mod aggregator;
pub mod config;
pub mod error;
pub mod ingestion;
pub mod normalize;
pub mod prompt;
pub mod schema;
pub mod store;

#[cfg(feature = "gemini")]
pub mod llm;
#[cfg(feature = "gemini")]
pub mod session;

pub use aggregator::{aggregate_all, load_month, load_original, loaded_months};
pub use config::Settings;
pub use error::{InsightsError, Result};
pub use ingestion::{
    clear_month, ingest, ingest_path, read_sheet, IngestionReport, SheetFormat, MIN_COLUMNS,
};
pub use normalize::{normalize_header, normalize_row};
pub use prompt::{build_prompt, data_structure, MAX_PROMPT_ROWS};
pub use schema::*;
pub use store::{JsonFileStore, KeyValueStore, MemoryStore};

#[cfg(feature = "gemini")]
pub use llm::{GeminiClient, InsightProvider, FALLBACK_ANSWER};
#[cfg(feature = "gemini")]
pub use session::{ChatSession, SessionState};
