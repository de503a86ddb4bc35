use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Pages forwarded to extraction when no budget is given
pub const DEFAULT_PAGE_BUDGET: usize = 40;

/// Documents at or below this length are extracted without classification
pub const CLASSIFICATION_MIN_PAGES: u32 = 20;

#[derive(Debug, thiserror::Error)]
pub enum TriageError {
    #[error("page budget must be greater than zero")]
    ZeroBudget,
    #[error("no page list found in classifier response")]
    MissingPageList,
    #[error("invalid classifier response: {0}")]
    InvalidResponse(#[from] serde_json::Error),
}

/// Section of a return a page belongs to, as tagged by the classifier
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum FormType {
    #[serde(rename = "1040_main")]
    Form1040Main,
    #[serde(rename = "schedule_1")]
    Schedule1,
    #[serde(rename = "schedule_2")]
    Schedule2,
    #[serde(rename = "schedule_3")]
    Schedule3,
    ScheduleA,
    ScheduleB,
    ScheduleC,
    ScheduleD,
    ScheduleE,
    #[serde(rename = "k1_summary")]
    K1Summary,
    #[serde(rename = "k1_detail")]
    K1Detail,
    StateMain,
    StateSchedule,
    Worksheet,
    SupportingDoc,
    Other,
}

impl FormType {
    pub const ALL: [FormType; 16] = [
        FormType::Form1040Main,
        FormType::Schedule1,
        FormType::Schedule2,
        FormType::Schedule3,
        FormType::ScheduleA,
        FormType::ScheduleB,
        FormType::ScheduleC,
        FormType::ScheduleD,
        FormType::ScheduleE,
        FormType::K1Summary,
        FormType::K1Detail,
        FormType::StateMain,
        FormType::StateSchedule,
        FormType::Worksheet,
        FormType::SupportingDoc,
        FormType::Other,
    ];

    /// Tag used by the classifier
    pub fn as_str(self) -> &'static str {
        match self {
            FormType::Form1040Main => "1040_main",
            FormType::Schedule1 => "schedule_1",
            FormType::Schedule2 => "schedule_2",
            FormType::Schedule3 => "schedule_3",
            FormType::ScheduleA => "schedule_a",
            FormType::ScheduleB => "schedule_b",
            FormType::ScheduleC => "schedule_c",
            FormType::ScheduleD => "schedule_d",
            FormType::ScheduleE => "schedule_e",
            FormType::K1Summary => "k1_summary",
            FormType::K1Detail => "k1_detail",
            FormType::StateMain => "state_main",
            FormType::StateSchedule => "state_schedule",
            FormType::Worksheet => "worksheet",
            FormType::SupportingDoc => "supporting_doc",
            FormType::Other => "other",
        }
    }
}

impl std::fmt::Display for FormType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Priority class for admission under the page budget
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Tier {
    Essential,
    Important,
    Optional,
    Excluded,
}

impl Tier {
    pub fn display(&self) -> &'static str {
        match self {
            Tier::Essential => "essential",
            Tier::Important => "important",
            Tier::Optional => "optional",
            Tier::Excluded => "skip",
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.display())
    }
}

/// Assignment of form types to tiers. Unmapped types are excluded.
#[derive(Debug, Clone)]
pub struct TierMap {
    tiers: HashMap<FormType, Tier>,
}

impl TierMap {
    pub fn new(tiers: HashMap<FormType, Tier>) -> Self {
        TierMap { tiers }
    }

    pub fn tier(&self, form_type: FormType) -> Tier {
        self.tiers
            .get(&form_type)
            .copied()
            .unwrap_or(Tier::Excluded)
    }

    pub fn with(mut self, form_type: FormType, tier: Tier) -> Self {
        self.tiers.insert(form_type, tier);
        self
    }
}

impl Default for TierMap {
    fn default() -> Self {
        use FormType::*;

        let essential = [Form1040Main, StateMain].map(|f| (f, Tier::Essential));
        let important = [
            Schedule1, ScheduleA, ScheduleB, ScheduleC, ScheduleD, ScheduleE, K1Summary,
        ]
        .map(|f| (f, Tier::Important));
        let optional = [Schedule2, Schedule3, StateSchedule].map(|f| (f, Tier::Optional));
        let excluded = [K1Detail, Worksheet, SupportingDoc, Other].map(|f| (f, Tier::Excluded));

        let tiers = essential
            .into_iter()
            .chain(important)
            .chain(optional)
            .chain(excluded)
            .collect();
        TierMap { tiers }
    }
}

/// Classifier output for a single page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct PageClassification {
    /// 1-based page number
    #[serde(alias = "page")]
    pub page_number: u32,
    #[serde(alias = "type")]
    pub form_type: FormType,
}

impl PageClassification {
    pub fn new(page_number: u32, form_type: FormType) -> Self {
        PageClassification {
            page_number,
            form_type,
        }
    }
}

/// Pages chosen for extraction
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PageSelection {
    pub selected_pages: Vec<u32>,
    pub skipped_pages: Vec<u32>,
    /// Why each page was selected or skipped
    pub reason: BTreeMap<u32, String>,
}

/// Choose which pages to forward for extraction.
///
/// Pages are admitted in tier order (essential, important, optional), in
/// input order within a tier, until `budget` pages are selected. Excluded
/// pages are always skipped. Both page lists are returned in page order.
pub fn select_pages(
    classifications: &[PageClassification],
    budget: usize,
    tier_map: &TierMap,
) -> Result<PageSelection, TriageError> {
    if budget == 0 {
        return Err(TriageError::ZeroBudget);
    }

    let mut selection = PageSelection::default();
    let mut buckets: BTreeMap<Tier, Vec<u32>> = BTreeMap::new();

    for page in classifications {
        let tier = tier_map.tier(page.form_type);
        selection
            .reason
            .insert(page.page_number, format!("{}: {}", tier, page.form_type));
        buckets.entry(tier).or_default().push(page.page_number);
    }

    let mut remaining = budget;
    for (tier, pages) in buckets {
        for page in pages {
            if tier != Tier::Excluded && remaining > 0 {
                selection.selected_pages.push(page);
                remaining -= 1;
            } else {
                selection.skipped_pages.push(page);
            }
        }
    }

    selection.selected_pages.sort_unstable();
    selection.skipped_pages.sort_unstable();

    log::info!(
        "Selected {} of {} pages (budget {})",
        selection.selected_pages.len(),
        classifications.len(),
        budget
    );
    for (page, reason) in &selection.reason {
        log::debug!("Page {}: {}", page, reason);
    }

    Ok(selection)
}

/// Placeholder classification for documents too short to classify
pub fn unclassified(total_pages: u32) -> Vec<PageClassification> {
    (1..=total_pages)
        .map(|page| PageClassification::new(page, FormType::Other))
        .collect()
}

pub fn needs_classification(total_pages: u32) -> bool {
    total_pages > CLASSIFICATION_MIN_PAGES
}

#[derive(Debug, Deserialize)]
struct ClassifierEntry {
    #[serde(alias = "page_number")]
    page: u32,
    #[serde(rename = "type", alias = "form_type")]
    form_type: FormType,
}

/// Parse the classifier's reply, a JSON array of `{"page", "type"}` objects
/// that may be surrounded by prose.
pub fn parse_classifications(response: &str) -> Result<Vec<PageClassification>, TriageError> {
    let start = response.find('[').ok_or(TriageError::MissingPageList)?;
    let end = response.rfind(']').ok_or(TriageError::MissingPageList)?;
    if end < start {
        return Err(TriageError::MissingPageList);
    }

    let entries: Vec<ClassifierEntry> = serde_json::from_str(&response[start..=end])?;
    Ok(entries
        .into_iter()
        .map(|e| PageClassification::new(e.page, e.form_type))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::{prop, prop_assert, prop_assert_eq, proptest};
    use std::collections::HashSet;

    fn pages(types: &[FormType]) -> Vec<PageClassification> {
        types
            .iter()
            .enumerate()
            .map(|(i, t)| PageClassification::new(i as u32 + 1, *t))
            .collect()
    }

    #[test]
    fn budget_exhausted_in_tier_order() {
        let input = pages(&[
            FormType::Form1040Main,
            FormType::ScheduleA,
            FormType::ScheduleB,
        ]);
        let selection = select_pages(&input, 2, &TierMap::default()).unwrap();

        assert_eq!(selection.selected_pages, vec![1, 2]);
        assert_eq!(selection.skipped_pages, vec![3]);
    }

    #[test]
    fn essential_pages_admitted_before_lower_tiers() {
        let input = pages(&[
            FormType::Schedule2,
            FormType::ScheduleC,
            FormType::Form1040Main,
            FormType::StateMain,
            FormType::ScheduleD,
        ]);
        let selection = select_pages(&input, 3, &TierMap::default()).unwrap();

        assert_eq!(selection.selected_pages, vec![2, 3, 4]);
        assert_eq!(selection.skipped_pages, vec![1, 5]);
    }

    #[test]
    fn essential_pages_skipped_when_over_budget() {
        let input = pages(&[
            FormType::Form1040Main,
            FormType::Form1040Main,
            FormType::StateMain,
        ]);
        let selection = select_pages(&input, 2, &TierMap::default()).unwrap();

        assert_eq!(selection.selected_pages, vec![1, 2]);
        assert_eq!(selection.skipped_pages, vec![3]);
    }

    #[test]
    fn excluded_pages_always_skipped() {
        let input = pages(&[
            FormType::Worksheet,
            FormType::Form1040Main,
            FormType::SupportingDoc,
            FormType::Other,
        ]);
        let selection = select_pages(&input, 40, &TierMap::default()).unwrap();

        assert_eq!(selection.selected_pages, vec![2]);
        assert_eq!(selection.skipped_pages, vec![1, 3, 4]);
    }

    #[test]
    fn budget_covers_everything() {
        let input = pages(&[
            FormType::Form1040Main,
            FormType::Schedule1,
            FormType::Schedule3,
        ]);
        let selection = select_pages(&input, 10, &TierMap::default()).unwrap();

        assert_eq!(selection.selected_pages, vec![1, 2, 3]);
        assert!(selection.skipped_pages.is_empty());
    }

    #[test]
    fn reasons_recorded_for_every_page() {
        let input = pages(&[
            FormType::Form1040Main,
            FormType::ScheduleE,
            FormType::StateSchedule,
            FormType::K1Detail,
        ]);
        let selection = select_pages(&input, 1, &TierMap::default()).unwrap();

        assert_eq!(selection.reason[&1], "essential: 1040_main");
        assert_eq!(selection.reason[&2], "important: schedule_e");
        assert_eq!(selection.reason[&3], "optional: state_schedule");
        assert_eq!(selection.reason[&4], "skip: k1_detail");
    }

    #[test]
    fn empty_input_gives_empty_selection() {
        let selection = select_pages(&[], 5, &TierMap::default()).unwrap();
        assert_eq!(selection, PageSelection::default());
    }

    #[test]
    fn zero_budget_rejected() {
        let input = pages(&[FormType::Form1040Main]);
        assert!(matches!(
            select_pages(&input, 0, &TierMap::default()),
            Err(TriageError::ZeroBudget)
        ));
    }

    #[test]
    fn duplicate_pages_kept() {
        let input = vec![
            PageClassification::new(1, FormType::Form1040Main),
            PageClassification::new(1, FormType::Schedule1),
        ];
        let selection = select_pages(&input, 5, &TierMap::default()).unwrap();
        assert_eq!(selection.selected_pages, vec![1, 1]);
    }

    #[test]
    fn custom_tier_map() {
        let tiers = TierMap::default().with(FormType::Worksheet, Tier::Essential);
        let input = pages(&[FormType::Form1040Main, FormType::Worksheet]);
        let selection = select_pages(&input, 1, &tiers).unwrap();

        assert_eq!(selection.selected_pages, vec![1]);
        assert_eq!(selection.reason[&2], "essential: worksheet");
    }

    #[test]
    fn unmapped_types_excluded() {
        let tiers = TierMap::new(HashMap::new());
        assert_eq!(tiers.tier(FormType::Form1040Main), Tier::Excluded);
    }

    #[test]
    fn parse_classifier_response_with_prose() {
        let response = r#"Here are the classifications:
[
  {"page": 1, "type": "1040_main"},
  {"page": 2, "type": "schedule_1"},
  {"page": 3, "type": "k1_detail"}
]
Let me know if you need anything else."#;

        let parsed = parse_classifications(response).unwrap();
        assert_eq!(
            parsed,
            vec![
                PageClassification::new(1, FormType::Form1040Main),
                PageClassification::new(2, FormType::Schedule1),
                PageClassification::new(3, FormType::K1Detail),
            ]
        );
    }

    #[test]
    fn parse_rejects_missing_array() {
        assert!(matches!(
            parse_classifications("no pages here"),
            Err(TriageError::MissingPageList)
        ));
    }

    #[test]
    fn parse_rejects_unknown_form_type() {
        assert!(matches!(
            parse_classifications(r#"[{"page": 1, "type": "schedule_z"}]"#),
            Err(TriageError::InvalidResponse(_))
        ));
    }

    #[test]
    fn form_type_tags_match_serde() {
        for form_type in FormType::ALL {
            let json = serde_json::to_string(&form_type).unwrap();
            assert_eq!(json, format!("\"{}\"", form_type.as_str()));
        }
    }

    #[test]
    fn short_documents_skip_classification() {
        assert!(!needs_classification(20));
        assert!(needs_classification(21));
        let pages = unclassified(3);
        assert_eq!(pages.len(), 3);
        assert_eq!(pages[2], PageClassification::new(3, FormType::Other));
    }

    proptest! {
        #![proptest_config(proptest::test_runner::Config::with_cases(64))]

        #[test]
        fn prop_selection_partitions_pages(
            kinds in prop::collection::vec(0usize..16, 0..80),
            budget in 1usize..50,
        ) {
            let input: Vec<_> = kinds
                .iter()
                .enumerate()
                .map(|(i, k)| PageClassification::new(i as u32 + 1, FormType::ALL[*k]))
                .collect();
            let tiers = TierMap::default();
            let selection = select_pages(&input, budget, &tiers).unwrap();

            prop_assert!(selection.selected_pages.len() <= budget);
            prop_assert_eq!(
                selection.selected_pages.len() + selection.skipped_pages.len(),
                input.len()
            );

            let mut all: Vec<u32> = selection
                .selected_pages
                .iter()
                .chain(&selection.skipped_pages)
                .copied()
                .collect();
            all.sort_unstable();
            let expected: Vec<u32> = (1..=input.len() as u32).collect();
            prop_assert_eq!(all, expected);

            prop_assert!(selection.selected_pages.windows(2).all(|w| w[0] <= w[1]));

            let essential: HashSet<u32> = input
                .iter()
                .filter(|p| tiers.tier(p.form_type) == Tier::Essential)
                .map(|p| p.page_number)
                .collect();
            if essential.len() <= budget {
                let selected: HashSet<u32> = selection.selected_pages.iter().copied().collect();
                prop_assert!(essential.is_subset(&selected));
            }
        }
    }
}
