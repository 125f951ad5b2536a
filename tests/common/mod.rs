//! Common test utilities

#![allow(dead_code)]

use async_trait::async_trait;
use delegator::error::{ExecutionError, ExecutionResult};
use delegator::runner::{Deadline, LaunchOutput, LaunchRequest, Launcher};
use delegator::system::{MetricsError, MetricsProvider, RegistryError, RegistrySource};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;
use tempfile::TempDir;

/// A profile with one CPU-gated task and one ungated task using variables
pub const SAMPLE_PROFILE: &str = r#"{
  "scp_version": "1.2",
  "Period": 0,
  "log_level": "info",
  "async_execute": false,
  "variables": [
    {"alias": "out", "value": "$OUTPUT_DIR"},
    {"alias": "mode", "value": "-filemode"},
    {"alias": "build", "value": "$REG_QUERY(HKEY_LOCAL_MACHINE, [SOFTWARE\\Agent], Build)"},
    {"alias": "broken", "value": "$REG_QUERY(HKEY_LOCAL_MACHINE, Build)"}
  ],
  "tasks": [
    {"id": 1, "name": "cpu trace", "condition": 1, "action": 1},
    {"id": 2, "name": "agent query", "condition": 0, "action": 2}
  ],
  "template": {
    "actions": [
      {
        "id": 1,
        "name": "wpr",
        "executable": "wpr.exe",
        "arguments": [
          {"command": "-start", "value": "CPU"},
          {"command": "", "value": "{mode}"}
        ],
        "pre_action": 3,
        "post_action": 0,
        "property": 1,
        "output": "wpr.log"
      },
      {
        "id": 2,
        "name": "dsa query",
        "executable": "dsa_query.cmd",
        "arguments": [
          {"command": "-o", "value": "{out}"},
          {"command": "-x", "value": "{broken}"}
        ],
        "property": 1
      },
      {
        "id": 3,
        "name": "dsa control",
        "executable": "dsa_control.cmd",
        "arguments": [{"command": "-b", "value": "{build}"}],
        "property": 1
      }
    ],
    "action_properties": [
      {"id": 1, "timeout_sec": 30, "period_sec": 0, "repeat": {"count": 1, "interval_sec": 0}}
    ],
    "conditions": [
      {
        "id": 1,
        "name": "busy agent",
        "monitor_process": "ds_agent.exe",
        "timeout_sec": 5,
        "criteria": {"mandatory": [1], "optional": []}
      }
    ],
    "condition_criteria": [
      {"id": 1, "type": "CPU", "threshold": 80, "operator": ">", "maturity_ms": 0}
    ]
  }
}"#;

/// Create a temporary directory with a profile file
pub fn create_test_profile(file_name: &str, content: &str) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let profile_path = temp_dir.path().join(file_name);
    fs::write(&profile_path, content).unwrap();
    (temp_dir, profile_path)
}

/// Create a test profile in a parent directory of the returned subdirectory
pub fn create_test_profile_in_subdir(content: &str) -> (TempDir, PathBuf, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let profile_path = temp_dir.path().join("profile.json");
    let sub_dir = temp_dir.path().join("subdir");

    fs::write(&profile_path, content).unwrap();
    fs::create_dir(&sub_dir).unwrap();

    (temp_dir, profile_path, sub_dir)
}

/// Launcher that records requests instead of spawning processes
#[derive(Default)]
pub struct RecordingLauncher {
    pub requests: Mutex<Vec<LaunchRequest>>,
    pub exit_code: i32,
    pub delay: Duration,
}

impl RecordingLauncher {
    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn args(&self) -> Vec<Vec<String>> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.args.clone())
            .collect()
    }
}

#[async_trait]
impl Launcher for RecordingLauncher {
    async fn launch(
        &self,
        request: &LaunchRequest,
        deadline: &Deadline,
    ) -> ExecutionResult<LaunchOutput> {
        self.requests.lock().unwrap().push(request.clone());
        deadline
            .sleep(self.delay)
            .await
            .map_err(ExecutionError::Cancelled)?;

        Ok(LaunchOutput {
            code: Some(self.exit_code),
            success: self.exit_code == 0,
            output: format!("{}\n", request.args.join(" ")).into_bytes(),
        })
    }
}

/// Metrics with fixed readings
#[derive(Debug, Clone, Copy, Default)]
pub struct FakeMetrics {
    pub cpu: f64,
    pub memory: u64,
    pub disk: u64,
}

impl MetricsProvider for FakeMetrics {
    fn process_cpu_percent(&self, _process: &str) -> Result<f64, MetricsError> {
        Ok(self.cpu)
    }

    fn process_memory_mb(&self, _process: &str) -> Result<u64, MetricsError> {
        Ok(self.memory)
    }

    fn disk_free_gb(&self, _path: &Path) -> Result<u64, MetricsError> {
        Ok(self.disk)
    }
}

/// Registry holding a single value
pub struct FakeRegistry {
    pub hive: &'static str,
    pub path: &'static str,
    pub name: &'static str,
    pub value: &'static str,
}

impl Default for FakeRegistry {
    fn default() -> Self {
        FakeRegistry {
            hive: "HKEY_LOCAL_MACHINE",
            path: "SOFTWARE\\Agent",
            name: "Build",
            value: "20.0.1",
        }
    }
}

impl RegistrySource for FakeRegistry {
    fn query(&self, hive: &str, path: &str, name: &str) -> Result<String, RegistryError> {
        if hive == self.hive && path == self.path && name == self.name {
            Ok(self.value.to_string())
        } else {
            Err(RegistryError::NotFound(format!("{}\\{}\\{}", hive, path, name)))
        }
    }
}
