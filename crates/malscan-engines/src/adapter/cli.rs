//! Adapter for engines driven through a local command-line scanner.

use async_trait::async_trait;
use malscan_core::{EngineDescriptor, EngineError, RawScanOutput, UpdateOutcome, Verdict};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};

use super::{is_executable, EngineAdapter};
use crate::parser::OutputParser;
use crate::presets::Preset;
use crate::runner::{ProcessRunner, ProcessSpec, DEFAULT_PROCESS_TIMEOUT};

/// Argument placeholder replaced by the staged artifact path.
pub const FILE_PLACEHOLDER: &str = "{file}";

/// Everything needed to drive one CLI engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineProfile {
    pub descriptor: EngineDescriptor,
    /// Scanner arguments; `{file}` marks where the artifact path goes
    pub scan_args: Vec<String>,
    pub version_args: Vec<String>,
    pub update_check_args: Vec<String>,
    pub update_args: Vec<String>,
    /// Privilege wrapper prepended to updater invocations (e.g. `sudo`)
    pub elevate_with: Option<PathBuf>,
    /// Exit codes that still carry a report. Empty accepts any code.
    pub accepted_exit_codes: Vec<i32>,
    /// Updater output line meaning "no new definitions"
    pub up_to_date_phrase: String,
    /// Updater output line meaning "definitions installed"
    pub update_success_phrase: String,
    /// Budget for each subprocess
    pub timeout: Duration,
}

impl EngineProfile {
    /// Profile built entirely from a preset's defaults
    #[must_use]
    pub fn from_preset(preset: Preset) -> Self {
        let d = preset.defaults();
        let owned = |args: &[&str]| args.iter().map(ToString::to_string).collect::<Vec<_>>();

        Self {
            descriptor: EngineDescriptor {
                name: d.name.to_string(),
                platform: d.platform,
                engine_path: PathBuf::from(d.engine_path),
                update_path: PathBuf::from(d.update_path),
                authors: owned(d.authors),
                references: owned(d.references),
            },
            scan_args: owned(d.scan_args),
            version_args: owned(d.version_args),
            update_check_args: owned(d.update_check_args),
            update_args: owned(d.update_args),
            elevate_with: None,
            accepted_exit_codes: d.accepted_exit_codes.to_vec(),
            up_to_date_phrase: d.up_to_date_phrase.to_string(),
            update_success_phrase: d.update_success_phrase.to_string(),
            timeout: DEFAULT_PROCESS_TIMEOUT,
        }
    }

    fn exit_accepted(&self, code: Option<i32>) -> bool {
        code.is_some_and(|c| self.accepted_exit_codes.is_empty() || self.accepted_exit_codes.contains(&c))
    }
}

/// [`EngineAdapter`] that shells out to a scanner binary and its updater.
pub struct CliEngine {
    profile: EngineProfile,
    parser: Arc<dyn OutputParser>,
    runner: Arc<dyn ProcessRunner>,
}

impl CliEngine {
    #[must_use]
    pub fn new(
        profile: EngineProfile,
        parser: Arc<dyn OutputParser>,
        runner: Arc<dyn ProcessRunner>,
    ) -> Self {
        Self {
            profile,
            parser,
            runner,
        }
    }

    /// Invocation profile
    #[must_use]
    pub const fn profile(&self) -> &EngineProfile {
        &self.profile
    }

    fn not_installed(&self) -> EngineError {
        EngineError::NotInstalled {
            engine: self.profile.descriptor.name.clone(),
        }
    }

    /// Scanner invocation for `artifact`. The path is appended when no
    /// argument carries the placeholder.
    fn scan_spec(&self, artifact: &Path) -> ProcessSpec {
        let args = &self.profile.scan_args;
        let mut spec = ProcessSpec::new(&self.profile.descriptor.engine_path)
            .args(args.iter().map(|a| substitute(a, artifact)))
            .timeout(self.profile.timeout);

        if !args.iter().any(|a| a.contains(FILE_PLACEHOLDER)) {
            spec = spec.arg(artifact);
        }
        spec
    }

    fn updater_spec(&self, args: &[String]) -> ProcessSpec {
        let update_path = &self.profile.descriptor.update_path;
        let spec = match &self.profile.elevate_with {
            Some(wrapper) => ProcessSpec::new(wrapper).arg(update_path),
            None => ProcessSpec::new(update_path),
        };
        spec.args(args).timeout(self.profile.timeout)
    }

    async fn try_scan(&self, artifact: &Path) -> Result<Verdict, EngineError> {
        let spec = self.scan_spec(artifact);
        let output = self.runner.run(&spec).await?;

        if !self.profile.exit_accepted(output.exit_code) {
            return Err(EngineError::UnexpectedExit {
                program: spec.program_name(),
                code: output.exit_code,
                stderr: output.stderr_text().trim().to_string(),
            });
        }

        let parsed = self.parser.parse_scan(&output).map_err(|e| {
            warn!(
                engine = %self.name(),
                error = %e,
                stdout_bytes = output.stdout.len(),
                "engine output did not match its grammar"
            );
            EngineError::OutputFormat {
                engine: self.name().to_string(),
                reason: e.to_string(),
            }
        })?;

        let verdict = if parsed.infected {
            Verdict::infected(self.name(), parsed.label)
        } else {
            Verdict::clean(self.name())
        };

        Ok(verdict
            .with_engine_version(parsed.engine_version)
            .with_definitions_date(parsed.definitions_date)
            .with_elapsed(output.elapsed))
    }
}

impl std::fmt::Debug for CliEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CliEngine")
            .field("profile", &self.profile)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl EngineAdapter for CliEngine {
    fn descriptor(&self) -> &EngineDescriptor {
        &self.profile.descriptor
    }

    fn is_installed(&self) -> bool {
        let d = &self.profile.descriptor;
        d.platform.supports_host() && is_executable(&d.engine_path) && is_executable(&d.update_path)
    }

    async fn version(&self) -> Result<String, EngineError> {
        if !self.is_installed() {
            return Err(self.not_installed());
        }

        let spec = ProcessSpec::new(&self.profile.descriptor.engine_path)
            .args(&self.profile.version_args)
            .timeout(self.profile.timeout);

        let output = self
            .runner
            .run(&spec)
            .await
            .map_err(|e| EngineError::VersionQueryFailed {
                engine: self.name().to_string(),
                reason: e.to_string(),
            })?;

        self.parser
            .parse_version(&output)
            .ok_or_else(|| EngineError::VersionQueryFailed {
                engine: self.name().to_string(),
                reason: "no version line in output".to_string(),
            })
    }

    async fn is_update_available(&self) -> Result<bool, EngineError> {
        if !self.is_installed() {
            return Err(self.not_installed());
        }

        // Only the phrase counts; the exit status is not consulted.
        let output = self
            .runner
            .run(&self.updater_spec(&self.profile.update_check_args))
            .await?;

        let up_to_date = output.contains_line(&self.profile.up_to_date_phrase);
        debug!(engine = %self.name(), up_to_date, "checked for definition updates");
        Ok(!up_to_date)
    }

    async fn update_definitions(&self) -> Result<UpdateOutcome, EngineError> {
        if !self.is_update_available().await? {
            return Ok(UpdateOutcome::AlreadyUpToDate);
        }

        let output = self
            .runner
            .run(&self.updater_spec(&self.profile.update_args))
            .await?;

        if output.contains_line(&self.profile.update_success_phrase) {
            info!(engine = %self.name(), "definitions updated");
            Ok(UpdateOutcome::Updated)
        } else {
            let reason = failure_reason(&output);
            warn!(engine = %self.name(), reason = %reason, "definitions update failed");
            Ok(UpdateOutcome::UpdateFailed(reason))
        }
    }

    #[instrument(skip(self, artifact), fields(artifact = %artifact.display()))]
    async fn scan(&self, artifact: &Path) -> Verdict {
        if !self.is_installed() {
            debug!(engine = %self.name(), "engine not installed, skipping");
            return Verdict::failed(self.name(), &self.not_installed());
        }

        let start = Instant::now();
        match self.try_scan(artifact).await {
            Ok(verdict) => {
                debug!(engine = %self.name(), state = ?verdict.state(), "scan finished");
                verdict
            }
            Err(e) => {
                warn!(engine = %self.name(), error = %e, "scan failed");
                Verdict::failed(self.name(), &e).with_elapsed(start.elapsed())
            }
        }
    }
}

fn substitute(arg: &str, file: &Path) -> OsString {
    if arg == FILE_PLACEHOLDER {
        file.as_os_str().to_owned()
    } else if arg.contains(FILE_PLACEHOLDER) {
        OsString::from(arg.replace(FILE_PLACEHOLDER, &file.to_string_lossy()))
    } else {
        OsString::from(arg)
    }
}

/// Last line of stdout, else stderr, else the exit status.
fn failure_reason(output: &RawScanOutput) -> String {
    output
        .lines()
        .pop()
        .or_else(|| {
            output
                .stderr_text()
                .lines()
                .map(str::trim)
                .rfind(|l| !l.is_empty())
                .map(ToString::to_string)
        })
        .unwrap_or_else(|| match output.exit_code {
            Some(code) => format!("updater exited with status {code} and no output"),
            None => "updater killed by a signal".to_string(),
        })
}
