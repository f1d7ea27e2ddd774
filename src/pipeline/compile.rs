//! Hand-off to the external document compiler (pandoc by default).
//!
//! The compiler runs with the workspace base as its working directory and the
//! asset directory on its resource path, so the relative image links the
//! stitcher wrote resolve. Its exit status decides success; stderr is kept
//! whole in the error and only shortened for display.

use crate::config::CompileConfig;
use crate::error::PantheonError;
use std::ffi::OsString;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info};

/// Paths one compilation works with.
#[derive(Debug, Clone, Copy)]
pub struct CompileJob<'a> {
    /// Working directory for the compiler.
    pub base: &'a Path,
    pub document: &'a Path,
    pub resource_dir: &'a Path,
    pub output: &'a Path,
}

/// Argument list for one compiler run, without the program name.
pub fn compiler_args(config: &CompileConfig, job: &CompileJob<'_>) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec![
        job.document.into(),
        "-o".into(),
        job.output.into(),
        "--resource-path".into(),
        job.resource_dir.into(),
    ];
    if let Some(engine) = &config.pdf_engine {
        args.push(format!("--pdf-engine={engine}").into());
    }
    args
}

/// Run the compiler and wait for it.
///
/// Creates the output's parent directory first.
pub async fn compile(config: &CompileConfig, job: &CompileJob<'_>) -> Result<(), PantheonError> {
    if let Some(parent) = job.output.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|source| PantheonError::Workspace {
                path: parent.to_path_buf(),
                source,
            })?;
    }

    let args = compiler_args(config, job);
    debug!("Running {} {:?} in {}", config.program, args, job.base.display());

    let output = Command::new(&config.program)
        .args(&args)
        .current_dir(job.base)
        .stdin(Stdio::null())
        .output()
        .await
        .map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => PantheonError::CompilerNotFound {
                program: config.program.clone(),
            },
            _ => PantheonError::Internal(format!("failed to start {}: {e}", config.program)),
        })?;

    if !output.status.success() {
        return Err(PantheonError::CompilationFailed {
            program: config.program.clone(),
            code: output.status.code(),
            diagnostic: String::from_utf8_lossy(&output.stderr).into_owned(),
        });
    }

    info!("Compiled {} → {}", job.document.display(), job.output.display());
    Ok(())
}

/// Whether `program` can be started at all (`<program> --version` exits 0).
pub async fn compiler_available(program: &str) -> bool {
    Command::new(program)
        .arg("--version")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await
        .map(|s| s.success())
        .unwrap_or(false)
}
