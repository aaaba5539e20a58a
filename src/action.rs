use std::fmt;
use std::str::FromStr;

use reqwest::Method;

use crate::errors::{KvsError, Result};

/// HTTP method and base path an action is invoked with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionDescriptor {
    pub method: Method,
    /// Always `/` today, kept so actions can be moved to dedicated paths.
    pub path: &'static str,
}

/// The closed set of operations the KVS API accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Preset,
    UpdatePreset,
    UpdatePipeline,
    CreateTask,
    CreateFlowTask,
    FetchMetaInfo,
    GetPresetList,
    DelPreset,
    GetPresetDetail,
    QueryPipeline,
    DelTaskByTaskID,
    TopTaskByTaskID,
    GetTaskList,
    GetTaskByTaskID,
    GetTaskMetaInfo,
}

impl Action {
    /// Every known action, writes first.
    pub const ALL: [Action; 15] = [
        Action::Preset,
        Action::UpdatePreset,
        Action::UpdatePipeline,
        Action::CreateTask,
        Action::CreateFlowTask,
        Action::FetchMetaInfo,
        Action::GetPresetList,
        Action::DelPreset,
        Action::GetPresetDetail,
        Action::QueryPipeline,
        Action::DelTaskByTaskID,
        Action::TopTaskByTaskID,
        Action::GetTaskList,
        Action::GetTaskByTaskID,
        Action::GetTaskMetaInfo,
    ];

    /// Wire name sent as the `Action` query parameter.
    pub fn as_str(self) -> &'static str {
        match self {
            Action::Preset => "Preset",
            Action::UpdatePreset => "UpdatePreset",
            Action::UpdatePipeline => "UpdatePipeline",
            Action::CreateTask => "CreateTask",
            Action::CreateFlowTask => "CreateFlowTask",
            Action::FetchMetaInfo => "FetchMetaInfo",
            Action::GetPresetList => "GetPresetList",
            Action::DelPreset => "DelPreset",
            Action::GetPresetDetail => "GetPresetDetail",
            Action::QueryPipeline => "QueryPipeline",
            Action::DelTaskByTaskID => "DelTaskByTaskID",
            Action::TopTaskByTaskID => "TopTaskByTaskID",
            Action::GetTaskList => "GetTaskList",
            Action::GetTaskByTaskID => "GetTaskByTaskID",
            Action::GetTaskMetaInfo => "GetTaskMetaInfo",
        }
    }

    pub fn descriptor(self) -> ActionDescriptor {
        let method = match self {
            Action::Preset
            | Action::UpdatePreset
            | Action::UpdatePipeline
            | Action::CreateTask
            | Action::CreateFlowTask
            | Action::FetchMetaInfo => Method::POST,
            Action::GetPresetList
            | Action::DelPreset
            | Action::GetPresetDetail
            | Action::QueryPipeline
            | Action::DelTaskByTaskID
            | Action::TopTaskByTaskID
            | Action::GetTaskList
            | Action::GetTaskByTaskID
            | Action::GetTaskMetaInfo => Method::GET,
        };

        ActionDescriptor { method, path: "/" }
    }
}

impl FromStr for Action {
    type Err = KvsError;

    fn from_str(s: &str) -> Result<Self> {
        Action::ALL
            .iter()
            .copied()
            .find(|a| a.as_str() == s)
            .ok_or_else(|| KvsError::InvalidAction(s.to_string()))
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Look up the method and path for an action name.
///
/// Unknown names fail with [`KvsError::InvalidAction`].
pub fn resolve(action: &str) -> Result<ActionDescriptor> {
    action.parse::<Action>().map(Action::descriptor)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_actions_route_to_post() {
        for name in [
            "Preset",
            "UpdatePreset",
            "UpdatePipeline",
            "CreateTask",
            "CreateFlowTask",
            "FetchMetaInfo",
        ] {
            let d = resolve(name).unwrap();
            assert_eq!(d.method, Method::POST, "{name}");
            assert_eq!(d.path, "/");
        }
    }

    #[test]
    fn read_actions_route_to_get() {
        for name in [
            "GetPresetList",
            "DelPreset",
            "GetPresetDetail",
            "QueryPipeline",
            "DelTaskByTaskID",
            "TopTaskByTaskID",
            "GetTaskList",
            "GetTaskByTaskID",
            "GetTaskMetaInfo",
        ] {
            let d = resolve(name).unwrap();
            assert_eq!(d.method, Method::GET, "{name}");
            assert_eq!(d.path, "/");
        }
    }

    #[test]
    fn names_round_trip_through_from_str() {
        for action in Action::ALL {
            assert_eq!(action.as_str().parse::<Action>().unwrap(), action);
            assert_eq!(action.to_string(), action.as_str());
        }
    }

    #[test]
    fn unknown_action_is_rejected() {
        for name in ["", "preset", "DeleteEverything", "GetTaskList "] {
            match resolve(name) {
                Err(KvsError::InvalidAction(n)) => assert_eq!(n, name),
                other => panic!("expected InvalidAction for {name:?}, got {other:?}"),
            }
        }
    }
}
