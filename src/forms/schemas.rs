use crate::common::security::{FieldRule, FormSchema};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Forms submitted by the front end, named by the page that hosts them
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FormKind {
    ProductUnderstanding,
    Positioning,
    StoryArchitecture,
    CreativeHooks,
    BattleCards,
    WinLoss,
    GtmLaunch,
    MarketSegments,
    RoadmapStory,
}

impl FormKind {
    pub const ALL: [FormKind; 9] = [
        FormKind::ProductUnderstanding,
        FormKind::Positioning,
        FormKind::StoryArchitecture,
        FormKind::CreativeHooks,
        FormKind::BattleCards,
        FormKind::WinLoss,
        FormKind::GtmLaunch,
        FormKind::MarketSegments,
        FormKind::RoadmapStory,
    ];

    /// Page identifier
    pub fn as_str(&self) -> &'static str {
        match self {
            FormKind::ProductUnderstanding => "product-understanding",
            FormKind::Positioning => "positioning",
            FormKind::StoryArchitecture => "story-architecture",
            FormKind::CreativeHooks => "creative-hooks",
            FormKind::BattleCards => "battle-cards",
            FormKind::WinLoss => "win-loss",
            FormKind::GtmLaunch => "gtm-launch",
            FormKind::MarketSegments => "market-segments",
            FormKind::RoadmapStory => "roadmap-story",
        }
    }

    /// Page title shown above the form
    pub fn title(&self) -> &'static str {
        match self {
            FormKind::ProductUnderstanding => "Product Understanding",
            FormKind::Positioning => "Positioning Engine",
            FormKind::StoryArchitecture => "Story Architecture",
            FormKind::CreativeHooks => "Creative Hooks",
            FormKind::BattleCards => "Battle Cards",
            FormKind::WinLoss => "Win/Loss Analysis",
            FormKind::GtmLaunch => "Launch Planning",
            FormKind::MarketSegments => "Market Segments",
            FormKind::RoadmapStory => "Roadmap Stories",
        }
    }

    /// Validation rules for this form.
    ///
    /// Only the fields that gate generation carry rules; the remaining inputs
    /// on each page are free-form and are passed through unvalidated.
    pub fn schema(&self) -> FormSchema {
        match self {
            FormKind::ProductUnderstanding => FormSchema::new()
                .field(
                    "productName",
                    FieldRule::required("Product Name").max_length(100),
                )
                .field(
                    "productDescription",
                    FieldRule::required("Description").max_length(5000),
                ),
            FormKind::Positioning => FormSchema::new()
                .field("product", FieldRule::required("Product Name").max_length(100))
                .field("category", FieldRule::required("Market Category").max_length(200)),
            FormKind::StoryArchitecture => FormSchema::new()
                .field("product", FieldRule::required("Product Name").max_length(100))
                .field(
                    "problem",
                    FieldRule::required("Problem Statement").max_length(2000),
                ),
            FormKind::CreativeHooks => FormSchema::new()
                .field("product", FieldRule::required("Product/Topic").max_length(200))
                .field("pain", FieldRule::required("Pain Point").max_length(1000)),
            FormKind::BattleCards => FormSchema::new()
                .field("product", FieldRule::required("Your Product").max_length(100))
                .field(
                    "competitor",
                    FieldRule::required("Competitor Name").max_length(100),
                ),
            FormKind::WinLoss => FormSchema::new()
                .field("deal", FieldRule::required("Deal Name").max_length(200))
                .field("outcome", FieldRule::required("Outcome")),
            FormKind::GtmLaunch => FormSchema::new()
                .field("product", FieldRule::required("Product Name").max_length(200)),
            FormKind::MarketSegments => {
                FormSchema::new().field("product", FieldRule::required("Product").max_length(100))
            }
            FormKind::RoadmapStory => FormSchema::new()
                .field("feature", FieldRule::required("Feature Name").max_length(200))
                .field(
                    "technical",
                    FieldRule::required("Technical Details").max_length(5000),
                ),
        }
    }
}

impl fmt::Display for FormKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unrecognized form identifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownForm(pub String);

impl fmt::Display for UnknownForm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Unknown form: '{}'", self.0)
    }
}

impl std::error::Error for UnknownForm {}

impl FromStr for FormKind {
    type Err = UnknownForm;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FormKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| UnknownForm(s.to_string()))
    }
}
