//! Price comparison across shopping and food delivery apps.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use super::{field, parse_answer, parse_price, reports_failure, MissionRunner, MissionStatus};
use crate::agent::AgentOutcome;

/// Which vertical to compare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CommerceTask {
    Shopping,
    Food,
}

impl CommerceTask {
    pub fn platforms(&self) -> &'static [&'static str] {
        match self {
            CommerceTask::Shopping => &["Amazon", "Flipkart"],
            CommerceTask::Food => &["Zomato", "Swiggy"],
        }
    }

    pub fn item_type(&self) -> &'static str {
        match self {
            CommerceTask::Shopping => "product",
            CommerceTask::Food => "food item",
        }
    }
}

impl FromStr for CommerceTask {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "shopping" => Ok(CommerceTask::Shopping),
            "food" => Ok(CommerceTask::Food),
            other => Err(format!("unknown task '{}', expected shopping or food", other)),
        }
    }
}

impl fmt::Display for CommerceTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommerceTask::Shopping => f.write_str("shopping"),
            CommerceTask::Food => f.write_str("food"),
        }
    }
}

/// Top result found on one platform.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceQuote {
    pub platform: String,
    pub status: MissionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rating: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub numeric_price: Option<f64>,
    /// The agent's answer when it was not JSON.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_answer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PriceQuote {
    fn failed(platform: &str, error: impl Into<String>) -> Self {
        Self {
            platform: platform.to_string(),
            status: MissionStatus::Failed,
            title: None,
            price: None,
            rating: None,
            numeric_price: None,
            raw_answer: None,
            error: Some(error.into()),
        }
    }

    fn from_answer(platform: &str, answer: &str) -> Self {
        let Some(data) = parse_answer(answer) else {
            return Self {
                platform: platform.to_string(),
                status: MissionStatus::Success,
                title: None,
                price: None,
                rating: None,
                numeric_price: parse_price(answer),
                raw_answer: Some(answer.to_string()),
                error: None,
            };
        };

        if reports_failure(&data) {
            let error = field(&data, "error").unwrap_or_else(|| "app reported failure".to_string());
            return Self::failed(platform, error);
        }

        let price = field(&data, "price");
        Self {
            platform: platform.to_string(),
            status: MissionStatus::Success,
            title: field(&data, "title"),
            numeric_price: price.as_deref().and_then(parse_price),
            price,
            rating: field(&data, "rating"),
            raw_answer: None,
            error: None,
        }
    }
}

/// Quotes from every platform plus the cheapest one.
#[derive(Debug, Clone, Serialize)]
pub struct ComparisonReport {
    pub task: CommerceTask,
    pub query: String,
    pub quotes: Vec<PriceQuote>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cheapest: Option<String>,
}

/// Goal handed to the agent for one platform.
pub fn search_goal(app: &str, query: &str, item_type: &str) -> String {
    format!(
        "You are inside {app}. Search for \"{query}\". Find the top result for {item_type}. \
         Read its price and rating from the screen. \
         Finish with strictly JSON: {{\"title\": \"...\", \"price\": \"...\", \"rating\": \"...\"}}. \
         If the app fails to load or nothing matches, finish with {{\"status\": \"failed\", \"error\": \"...\"}}.",
        app = app,
        query = query,
        item_type = item_type
    )
}

/// Search `query` on `app` and read the top result.
pub async fn perform_search(
    runner: &MissionRunner,
    app: &str,
    query: &str,
    item_type: &str,
) -> PriceQuote {
    println!("\n[Status] Searching {} for '{}'...", app, query);
    let goal = search_goal(app, query, item_type);

    match runner.run_in_app(app, &goal, runner.max_steps()).await {
        Ok(AgentOutcome::Finished(answer)) => PriceQuote::from_answer(app, &answer),
        Ok(outcome @ AgentOutcome::StepBudgetExhausted) => {
            PriceQuote::failed(app, outcome.to_string())
        }
        Err(e) => PriceQuote::failed(app, e.to_string()),
    }
}

/// The successful quote with the lowest numeric price.
pub fn cheapest(quotes: &[PriceQuote]) -> Option<&PriceQuote> {
    quotes
        .iter()
        .filter(|q| q.status == MissionStatus::Success)
        .filter_map(|q| q.numeric_price.map(|p| (q, p)))
        .min_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(q, _)| q)
}

/// Run the search on every platform of `task`.
pub async fn compare(runner: &MissionRunner, task: CommerceTask, query: &str) -> ComparisonReport {
    let mut quotes = Vec::new();
    for platform in task.platforms() {
        quotes.push(perform_search(runner, platform, query, task.item_type()).await);
    }

    let cheapest = cheapest(&quotes).map(|q| q.platform.clone());
    ComparisonReport {
        task,
        query: query.to_string(),
        quotes,
        cheapest,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adb::mock::MockDevice;
    use crate::missions::tests::runner;
    use crate::model::mock::ScriptedModel;

    #[test]
    fn test_task_platforms() {
        assert_eq!(CommerceTask::Shopping.platforms(), &["Amazon", "Flipkart"]);
        assert_eq!(CommerceTask::Food.item_type(), "food item");
        assert_eq!("FOOD".parse::<CommerceTask>().unwrap(), CommerceTask::Food);
        assert!("travel".parse::<CommerceTask>().is_err());
    }

    #[test]
    fn test_quote_from_answers() {
        let quote = PriceQuote::from_answer(
            "Swiggy",
            "{\"title\": \"Chicken McNuggets\", \"price\": \"₹ 129\", \"rating\": \"4.3\"}",
        );
        assert_eq!(quote.status, MissionStatus::Success);
        assert_eq!(quote.numeric_price, Some(129.0));
        assert_eq!(quote.title.as_deref(), Some("Chicken McNuggets"));

        let quote = PriceQuote::from_answer("Zomato", "Price: Rs. 139");
        assert_eq!(quote.numeric_price, Some(139.0));
        assert_eq!(quote.raw_answer.as_deref(), Some("Price: Rs. 139"));

        let quote = PriceQuote::from_answer("Zomato", "{\"status\": \"failed\", \"error\": \"not installed\"}");
        assert_eq!(quote.status, MissionStatus::Failed);
        assert_eq!(quote.error.as_deref(), Some("not installed"));
    }

    #[test]
    fn test_cheapest_skips_failures() {
        let quotes = vec![
            PriceQuote::from_answer("A", "{\"price\": \"₹500\"}"),
            PriceQuote::failed("B", "boom"),
            PriceQuote::from_answer("C", "{\"price\": \"₹450\"}"),
            PriceQuote::from_answer("D", "{\"title\": \"no price\"}"),
        ];
        assert_eq!(cheapest(&quotes).unwrap().platform, "C");
        assert!(cheapest(&[]).is_none());
    }

    #[tokio::test]
    async fn test_compare_food() {
        let device = MockDevice::new();
        let model = ScriptedModel::with_replies([
            "FINISH({\"title\": \"Chicken McNuggets\", \"price\": \"₹149\"})",
            "FINISH({\"title\": \"Chicken McNuggets\", \"price\": \"₹129\"})",
        ]);
        let report = compare(&runner(&device, &model), CommerceTask::Food, "McNuggets").await;

        assert_eq!(report.quotes.len(), 2);
        assert_eq!(report.quotes[0].platform, "Zomato");
        assert_eq!(report.cheapest.as_deref(), Some("Swiggy"));
        assert!(model.prompts()[0].contains("Search for \"McNuggets\""));
        assert_eq!(
            device.calls_starting_with("monkey").len(),
            2,
            "each platform is launched"
        );
    }

    #[tokio::test]
    async fn test_budget_exhaustion_is_failure() {
        let device = MockDevice::new();
        let model = ScriptedModel::new();
        let r = runner(&device, &model);
        let quote = perform_search(&r, "Amazon", "headphones", "product").await;
        assert_eq!(quote.status, MissionStatus::Failed);
        assert_eq!(
            quote.error.as_deref(),
            Some("Max steps reached without definitive answer.")
        );
    }
}
