//! Prompt templates for the decision loop, the planners and the harvester.

use chrono::Local;

use crate::actions::ACTION_VOCABULARY;

fn today() -> String {
    Local::now().format("%B %d, %Y").to_string()
}

/// Render an action history for a prompt.
pub fn format_history(history: &[String]) -> String {
    if history.is_empty() {
        return "(none yet)".to_string();
    }
    history
        .iter()
        .enumerate()
        .map(|(i, action)| format!("{}. {}", i + 1, action))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Prompt for one observe/decide step.
pub fn decision_prompt(goal: &str, screen: &str, history: &[String]) -> String {
    let actions = ACTION_VOCABULARY
        .iter()
        .map(|(form, meaning)| format!("- {}: {}", form, meaning))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "You are a mobile agent operating an Android phone.\n\
         Today's date is: {date}\n\
         Goal: {goal}\n\n\
         Screen Content (visible elements):\n{screen}\n\n\
         Action History:\n{history}\n\n\
         Available Actions:\n{actions}\n\n\
         Output strictly one of the above formats on a single line. No markdown.",
        date = today(),
        goal = goal,
        screen = screen,
        history = format_history(history),
        actions = actions,
    )
}

/// Prompt for the simple step-list planner.
pub fn step_list_prompt(goal: &str, context: &serde_json::Value) -> String {
    format!(
        "You are a mobile automation planner.\n\
         Goal: {}\n\
         Context: {}\n\n\
         Return a JSON list of strings, where each string is a high-level action.\n\
         Example: [\"open_app Settings\", \"tap WiFi\", \"input_text password\"]\n\n\
         Output JSON only.",
        goal, context
    )
}

/// Sections that personalise the planning prompt.
#[derive(Debug, Clone, Default)]
pub struct PlanContext {
    pub hardware: String,
    pub preferences: String,
    pub habits: String,
    pub memories: Vec<String>,
}

/// System prompt for the context-aware planner.
pub fn planning_prompt(goal: &str, ctx: &PlanContext) -> String {
    let memories = if ctx.memories.is_empty() {
        "(none)".to_string()
    } else {
        ctx.memories
            .iter()
            .map(|m| format!("- {}", m))
            .collect::<Vec<_>>()
            .join("\n")
    };

    format!(
        "You are NeuroRun, an orchestration agent for Android automation.\n\
         Generate a JSON execution plan for the user's request.\n\n\
         USER PROFILE:\n\
         Hardware: {hardware}\n\
         Preferences: {preferences}\n\
         Habits: {habits}\n\n\
         RELEVANT MEMORIES:\n{memories}\n\n\
         INSTRUCTIONS:\n\
         1. Analyze the USER GOAL: \"{goal}\"\n\
         2. Use the profile and memories to adapt the plan (e.g. add waits on a slow network).\n\
         3. Return ONLY a JSON list of steps. Each step is one of:\n\
         {{\"action\": \"open_app\", \"target\": \"<app name or package>\"}}\n\
         {{\"action\": \"tap\", \"target\": \"<visible text>\"}}\n\
         {{\"action\": \"type\", \"text\": \"<text>\"}}\n\
         {{\"action\": \"wait\", \"duration\": <milliseconds>}}\n\
         {{\"action\": \"home\"}} / {{\"action\": \"back\"}} / {{\"action\": \"enter\"}}\n\
         {{\"command\": \"<device shell command>\"}}",
        hardware = ctx.hardware,
        preferences = ctx.preferences,
        habits = ctx.habits,
        memories = memories,
        goal = goal,
    )
}

/// Prompt asking for durable facts in a user message.
pub fn harvester_prompt(message: &str) -> String {
    format!(
        "You are a background fact-checker.\n\
         Analyze the user's latest message: \"{}\"\n\
         Extract any PERMANENT preferences, hardware details, or recurring habits.\n\
         Return strictly JSON updates in the following format. If nothing new is found, return null.\n\n\
         {{\n  \"hardware_specs\": {{ \"key\": \"value\" }},\n  \"preferences\": {{ \"key\": \"value\" }},\n  \"behavior_patterns\": [\"new pattern string\"]\n}}",
        message
    )
}
