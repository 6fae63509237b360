//! Event invitations sent through a messaging app.

use serde::Serialize;
use serde_json::{Map, Value};

use super::{field, parse_answer, reports_failure, MissionRunner, MissionStatus};
use crate::agent::AgentOutcome;

pub const DEFAULT_MESSAGING_APP: &str = "WhatsApp";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InviteResult {
    pub contact: String,
    pub status: MissionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_sent: Option<String>,
    /// Extra fields the agent reported.
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub details: Map<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl InviteResult {
    fn failed(contact: &str, error: impl Into<String>) -> Self {
        Self {
            contact: contact.to_string(),
            status: MissionStatus::Failed,
            time_sent: None,
            details: Map::new(),
            error: Some(error.into()),
        }
    }

    /// Only a structured confirmation counts as sent.
    fn from_answer(contact: &str, answer: &str) -> Self {
        let Some(mut data) = parse_answer(answer) else {
            return Self::failed(contact, format!("unstructured answer: {}", answer));
        };
        if reports_failure(&data) {
            let error = field(&data, "error").unwrap_or_else(|| "agent reported failure".to_string());
            return Self::failed(contact, error);
        }

        let time_sent = field(&data, "time_sent");
        for key in ["status", "contact", "time_sent"] {
            data.remove(key);
        }
        Self {
            contact: contact.to_string(),
            status: MissionStatus::Success,
            time_sent,
            details: data,
            error: None,
        }
    }
}

/// The invitation text.
pub fn build_invite_message(event: &str, date: &str, time: &str, location: &str) -> String {
    format!(
        "Hi! You are invited to the *{}* on *{}* at *{}*. Location: {}. See you there!",
        event, date, time, location
    )
}

/// Split a comma-separated contact list.
pub fn parse_contacts(contacts: &str) -> Vec<String> {
    contacts
        .split(',')
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn invite_goal(contact: &str, message: &str, app: &str) -> String {
    format!(
        "You are inside {app}. Tap the Search icon or bar. Type the contact name \"{contact}\". \
         Wait for \"{contact}\" to appear in the list and tap it to open the chat. \
         Type the following message exactly: \"{message}\". Tap the Send button. \
         Finish with strictly JSON: {{\"status\": \"success\", \"contact\": \"{contact}\", \"time_sent\": \"...\"}}. \
         If the contact cannot be found, finish with {{\"status\": \"failed\", \"error\": \"...\"}}.",
        app = app,
        contact = contact,
        message = message
    )
}

/// Send `message` to one contact.
pub async fn send_invite(
    runner: &MissionRunner,
    contact: &str,
    message: &str,
    app: &str,
) -> InviteResult {
    println!("\n[EventCoordinator] Sending invite to: {} on {}", contact, app);
    let goal = invite_goal(contact, message, app);

    match runner.run_in_app(app, &goal, runner.max_steps()).await {
        Ok(AgentOutcome::Finished(answer)) => InviteResult::from_answer(contact, &answer),
        Ok(outcome @ AgentOutcome::StepBudgetExhausted) => {
            InviteResult::failed(contact, outcome.to_string())
        }
        Err(e) => InviteResult::failed(contact, e.to_string()),
    }
}

/// Invite every contact in turn, pausing between them.
pub async fn send_invites(
    runner: &MissionRunner,
    contacts: &[String],
    message: &str,
    app: &str,
) -> Vec<InviteResult> {
    let mut results = Vec::with_capacity(contacts.len());
    for (i, contact) in contacts.iter().enumerate() {
        if i > 0 && !runner.cooldown().is_zero() {
            tokio::time::sleep(runner.cooldown()).await;
        }
        let result = send_invite(runner, contact, message, app).await;
        println!("Result for {}: {}", contact, result.status);
        results.push(result);
    }
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adb::mock::MockDevice;
    use crate::missions::tests::runner;
    use crate::model::mock::ScriptedModel;

    #[test]
    fn test_build_invite_message() {
        assert_eq!(
            build_invite_message("Diwali Party", "Nov 1", "8 PM", "Rooftop"),
            "Hi! You are invited to the *Diwali Party* on *Nov 1* at *8 PM*. Location: Rooftop. See you there!"
        );
    }

    #[test]
    fn test_parse_contacts() {
        assert_eq!(parse_contacts(" Mom, Rahul ,,Priya "), vec!["Mom", "Rahul", "Priya"]);
        assert!(parse_contacts(" , ").is_empty());
    }

    #[test]
    fn test_invite_result_parsing() {
        let result = InviteResult::from_answer(
            "Rahul",
            "<request_accomplished success=\"true\">{\"status\": \"success\", \"contact\": \"Rahul\", \"time_sent\": \"20:15\", \"chat\": \"opened\"}</request_accomplished>",
        );
        assert_eq!(result.status, MissionStatus::Success);
        assert_eq!(result.time_sent.as_deref(), Some("20:15"));
        assert_eq!(result.details["chat"], "opened");
        assert!(!result.details.contains_key("status"));

        let result = InviteResult::from_answer("Rahul", "Message sent!");
        assert_eq!(result.status, MissionStatus::Failed);
    }

    #[tokio::test]
    async fn test_send_invites_per_contact() {
        let device = MockDevice::new();
        let model = ScriptedModel::with_replies([
            "FINISH({\"status\": \"success\", \"contact\": \"Mom\", \"time_sent\": \"now\"})",
            "FINISH({\"status\": \"failed\", \"error\": \"contact not found\"})",
        ]);
        let contacts = parse_contacts("Mom, Nobody");
        let message = build_invite_message("Lunch", "Sunday", "1 PM", "Home");
        let results = send_invites(&runner(&device, &model), &contacts, &message, "WhatsApp").await;

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].status, MissionStatus::Success);
        assert_eq!(results[1].error.as_deref(), Some("contact not found"));
        assert!(model.prompts()[0].contains("\"Mom\""));
        assert_eq!(
            device.calls_starting_with("monkey -p com.whatsapp ").len(),
            2
        );
    }
}
