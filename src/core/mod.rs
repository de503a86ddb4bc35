pub mod au;
pub mod filename;
pub mod liability;
pub mod offsets;
pub mod record;
pub mod rules;
pub mod summary;
pub mod triage;

// Flat public surface for domain types and functions.
pub use au::FiscalYear;
pub use filename::year_from_filename;
pub use liability::{
    bracket_breakdown, compute_liability, BracketShare, LiabilityContext, LiabilityError,
    TaxLiability,
};
pub use offsets::income_offsets;
pub use record::{read_return_json, RecordError, ReturnDocument, ReturnSet, YearRecord};
pub use rules::{RuleRegistry, RuleSetError, RuleSetFile, TaxRuleSet};
pub use summary::{aggregate, percent_change, year_trends, AggregatedSummary, YearTrend};
pub use triage::{
    needs_classification, parse_classifications, select_pages, unclassified, FormType,
    PageClassification, PageSelection, Tier, TierMap, TriageError, DEFAULT_PAGE_BUDGET,
};
