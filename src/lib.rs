// Copyright 2025 NeuroRun Contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! # NeuroRun
//!
//! LLM-guided Android automation over ADB.
//!
//! The core is an observe → decide → act loop: the on-screen UI tree is
//! reduced to a short list of labelled elements, a chat model picks the next
//! action from a small vocabulary, and the action is replayed on the device
//! until the model finishes or the step budget runs out.
//!
//! On top of the loop sit a planner (goal → JSON step list → bridge), a
//! context core (user profile plus vector memory) and task missions for
//! price comparison, ride quotes and event invites.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use neuro_run::{AdbDevice, AgentConfig, ModelClient, ModelConfig, SmartAgent};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let mut device = AdbDevice::new(None);
//!     device.connect().await?;
//!
//!     let model = ModelClient::new(ModelConfig::default().with_api_key("..."));
//!     let mut agent = SmartAgent::new(Arc::new(device), Arc::new(model), AgentConfig::default());
//!
//!     let outcome = agent.run("Open Settings and turn on WiFi").await;
//!     println!("Task result: {}", outcome);
//!     Ok(())
//! }
//! ```

pub mod actions;
pub mod adb;
pub mod agent;
pub mod config;
pub mod memory;
pub mod missions;
pub mod model;
pub mod settings;

pub use actions::{Action, ActionDelays, ActionHandler, ActionResult};
pub use adb::{AdbDevice, Device};
pub use agent::{
    AgentConfig, AgentError, AgentOutcome, InsightHarvester, NeuroPlanner, Plan, PlanBridge,
    PlanStep, PromptEngine, SmartAgent,
};
pub use memory::{ContextManager, MemoryError, ProfileStore, UserProfile, VectorMemory};
pub use missions::{MissionRunner, MissionStatus};
pub use model::{ChatModel, ModelClient, ModelConfig, ModelResponse};
pub use settings::AppSettings;
