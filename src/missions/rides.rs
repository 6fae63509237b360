//! Ride-hailing fare checks.

use serde::Serialize;

use super::{field, parse_answer, parse_price, reports_failure, MissionRunner, MissionStatus};
use crate::agent::AgentOutcome;

pub const DEFAULT_RIDE_APPS: &[&str] = &["Uber", "Ola"];

/// Cheapest visible fare on one app.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RideQuote {
    pub app: String,
    pub status: MissionStatus,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub ride_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eta: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub numeric_price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_answer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RideQuote {
    fn failed(app: &str, error: impl Into<String>) -> Self {
        Self {
            app: app.to_string(),
            status: MissionStatus::Failed,
            ride_type: None,
            price: None,
            eta: None,
            numeric_price: None,
            raw_answer: None,
            error: Some(error.into()),
        }
    }

    fn from_answer(app: &str, answer: &str) -> Self {
        let Some(data) = parse_answer(answer) else {
            // Free text is only useful if it carries a fare.
            return match parse_price(answer) {
                Some(p) => Self {
                    app: app.to_string(),
                    status: MissionStatus::Success,
                    ride_type: None,
                    price: None,
                    eta: None,
                    numeric_price: Some(p),
                    raw_answer: Some(answer.to_string()),
                    error: None,
                },
                None => Self {
                    raw_answer: Some(answer.to_string()),
                    ..Self::failed(app, "no fare in answer")
                },
            };
        };

        if reports_failure(&data) {
            let error = field(&data, "error").unwrap_or_else(|| "price not visible".to_string());
            return Self::failed(app, error);
        }

        let price = field(&data, "price");
        Self {
            app: app.to_string(),
            status: MissionStatus::Success,
            ride_type: field(&data, "type"),
            numeric_price: price.as_deref().and_then(parse_price),
            price,
            eta: field(&data, "eta"),
            raw_answer: None,
            error: None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RideComparison {
    pub pickup: String,
    pub drop: String,
    pub quotes: Vec<RideQuote>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cheapest: Option<String>,
}

pub fn ride_goal(app: &str, pickup: &str, drop: &str) -> String {
    format!(
        "You are inside {app}. Set up a ride from \"{pickup}\" to \"{drop}\". \
         Wait for the price options to appear. Read the cheapest option (e.g. UberGo, Mini), its price and the ETA. \
         Do not book the ride. \
         Finish with strictly JSON: {{\"app\": \"{app}\", \"type\": \"...\", \"price\": \"...\", \"eta\": \"...\"}}. \
         If the price is not visible or the app fails, finish with {{\"status\": \"failed\", \"error\": \"...\"}}.",
        app = app,
        pickup = pickup,
        drop = drop
    )
}

/// Read the cheapest fare from `pickup` to `drop` on `app`.
pub async fn run_ride_check(runner: &MissionRunner, app: &str, pickup: &str, drop: &str) -> RideQuote {
    println!("\n[RideAgent] Checking {}...", app);
    let goal = ride_goal(app, pickup, drop);

    match runner.run_in_app(app, &goal, runner.max_steps()).await {
        Ok(AgentOutcome::Finished(answer)) => RideQuote::from_answer(app, &answer),
        Ok(outcome @ AgentOutcome::StepBudgetExhausted) => RideQuote::failed(app, outcome.to_string()),
        Err(e) => RideQuote::failed(app, e.to_string()),
    }
}

/// Check every app in turn and report the cheapest.
pub async fn compare_rides(
    runner: &MissionRunner,
    apps: &[String],
    pickup: &str,
    drop: &str,
) -> RideComparison {
    let mut quotes = Vec::with_capacity(apps.len());
    for app in apps {
        quotes.push(run_ride_check(runner, app, pickup, drop).await);
    }

    let cheapest = quotes
        .iter()
        .filter(|q| q.status == MissionStatus::Success)
        .filter_map(|q| q.numeric_price.map(|p| (q, p)))
        .min_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(q, _)| q.app.clone());

    RideComparison {
        pickup: pickup.to_string(),
        drop: drop.to_string(),
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
    fn test_quote_parsing() {
        let quote = RideQuote::from_answer(
            "Uber",
            "{\"app\": \"Uber\", \"type\": \"UberGo\", \"price\": \"₹245.50\", \"eta\": \"4 min\"}",
        );
        assert_eq!(quote.ride_type.as_deref(), Some("UberGo"));
        assert_eq!(quote.numeric_price, Some(245.5));
        assert_eq!(quote.eta.as_deref(), Some("4 min"));

        let quote = RideQuote::from_answer("Ola", "Mini costs Rs 210");
        assert_eq!(quote.status, MissionStatus::Success);
        assert_eq!(quote.numeric_price, Some(210.0));

        let quote = RideQuote::from_answer("Ola", "could not see prices");
        assert_eq!(quote.status, MissionStatus::Failed);
        assert!(quote.raw_answer.is_some());
    }

    #[test]
    fn test_serialized_shape() {
        let quote = RideQuote::from_answer("Uber", "{\"type\": \"Go\", \"price\": \"99\"}");
        let json = serde_json::to_value(&quote).unwrap();
        assert_eq!(json["type"], "Go");
        assert_eq!(json["status"], "success");
        assert!(json.get("error").is_none());
    }

    #[tokio::test]
    async fn test_compare_rides() {
        let device = MockDevice::new().with_response(
            "monkey -p com.olacabs.customer -c android.intent.category.LAUNCHER 1",
            "** No activities found to run, monkey aborted.",
        );
        let model = ScriptedModel::with_replies([
            "FINISH({\"app\": \"Uber\", \"type\": \"UberGo\", \"price\": \"₹310\", \"eta\": \"3 min\"})",
        ]);
        let apps = vec!["Uber".to_string(), "Ola".to_string()];
        let report = compare_rides(&runner(&device, &model), &apps, "Current Location", "Viviana Mall").await;

        assert_eq!(report.quotes[0].status, MissionStatus::Success);
        assert_eq!(report.quotes[1].status, MissionStatus::Failed);
        assert_eq!(report.cheapest.as_deref(), Some("Uber"));
        assert!(model.prompts()[0].contains("\"Viviana Mall\""));
    }
}
