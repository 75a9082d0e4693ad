use std::fs::{File, read_to_string};
use std::io::Write;
use std::process::{Child, ExitStatus, Stdio};
use std::time::{Duration, Instant};

use prjsense_re_hammer::{ActiveSet, Backend, DerivationError};
use prjsense_types::{ConfigImage, TileCoord};
use serde::Serialize;
use simple_error::bail;

use crate::toolchain::Toolchain;

#[derive(Serialize)]
struct Request<'a> {
    scope: &'a [TileCoord],
    active: &'a ActiveSet,
}

/// Derives images by running the configured external command once per
/// request, in a fresh temporary directory.
#[derive(Debug)]
pub struct CommandBackend {
    tc: Toolchain,
    pub debug: u8,
}

fn wait_with_timeout(child: &mut Child, timeout: Duration) -> Result<ExitStatus, DerivationError> {
    let start = Instant::now();
    loop {
        match child.try_wait()? {
            Some(status) => return Ok(status),
            None => {
                if start.elapsed() > timeout {
                    child.kill()?;
                    child.wait()?;
                    bail!(
                        "derivation command timed out after {} ms",
                        timeout.as_millis()
                    );
                }
                std::thread::sleep(Duration::from_millis(10));
            }
        }
    }
}

impl CommandBackend {
    pub fn new(tc: Toolchain) -> Self {
        CommandBackend { tc, debug: 0 }
    }
}

impl Backend for CommandBackend {
    fn derive_image(
        &self,
        scope: &[TileCoord],
        active: &ActiveSet,
    ) -> Result<ConfigImage, DerivationError> {
        let dir = tempfile::Builder::new()
            .prefix("prjsense_derive")
            .tempdir()?;
        let req = serde_json::to_string(&Request { scope, active })?;
        std::fs::write(dir.path().join("request.json"), &req)?;

        let mut cmd = self.tc.command()?;
        cmd.current_dir(dir.path());
        cmd.stdin(Stdio::null());
        cmd.stdout(File::create(dir.path().join("stdout.log"))?);
        cmd.stderr(File::create(dir.path().join("stderr.log"))?);
        cmd.arg("request.json");
        cmd.arg("image.json");
        if self.debug >= 2 {
            eprintln!("running {cmd:?} in {}", dir.path().display());
        }
        let mut child = cmd.spawn()?;
        let status = wait_with_timeout(&mut child, self.tc.timeout())?;
        if !status.success() {
            for log in ["stdout.log", "stderr.log"] {
                if let Ok(s) = read_to_string(dir.path().join(log)) {
                    let _ = std::io::stderr().write_all(s.as_bytes());
                }
            }
            bail!("derivation command failed: {status}");
        }
        let image = read_to_string(dir.path().join("image.json"))?;
        let image: ConfigImage = serde_json::from_str(&image)?;
        Ok(image)
    }
}
