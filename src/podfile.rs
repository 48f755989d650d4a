//! CocoaPods integration: the extension's pod declaration and `pod install`.

use std::fs;
use std::io::{BufRead, BufReader, ErrorKind};
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::ctx::{Error, Result};
use crate::ext::PODFILE_SNIPPET;

/// Installs the dependencies declared in a manifest directory.
pub trait PackageManager {
  fn install(&self, dir: &Path) -> Result<()>;
}

/// Runs `pod install --verbose`, forwarding its error output to the log.
pub struct Pods {
  pub program: String,
  pub timeout: Duration
}

impl Pods {
  pub fn new(timeout: Duration) -> Self {
    Pods { program: "pod".to_string(), timeout }
  }

  fn command_line(&self) -> String {
    [self.program.as_str(), "install", "--verbose"].join(" ")
  }

  fn failure<S: Into<String>>(&self, message: S) -> Error {
    Error::ExternalProcess { command: self.command_line(), message: message.into() }
  }
}

impl PackageManager for Pods {
  fn install(&self, dir: &Path) -> Result<()> {
    tracing::info!("Running `{}` in {}", self.command_line(), dir.display());

    let mut child = Command::new(&self.program)
      .args(&["install", "--verbose"])
      .current_dir(dir)
      .stdin(Stdio::null())
      .stdout(Stdio::null())
      .stderr(Stdio::piped())
      .spawn()
      .map_err(|e| self.failure(e.to_string()))?;

    let stderr = child.stderr.take();
    let reader = thread::spawn(move || {
      if let Some(stderr) = stderr {
        for line in BufReader::new(stderr).lines().map_while(|l| l.ok()) {
          tracing::warn!("{}", line);
        }
      }
    });

    let deadline = Instant::now() + self.timeout;
    let status = loop {
      match child.try_wait() {
        Ok(Some(status)) => break status,
        Ok(None)         => {},
        Err(e)           => {
          stop(child, reader);
          return Err(self.failure(e.to_string()));
        }
      }

      if Instant::now() >= deadline {
        stop(child, reader);
        return Err(self.failure(format!("timed out after {}s", self.timeout.as_secs())));
      }

      thread::sleep(Duration::from_millis(100));
    };

    let _ = reader.join();

    match status.success() {
      true  => Ok(()),
      false => Err(self.failure(format!("exited with {}", status)))
    }
  }
}

/// Kills the child and waits for it and its stderr reader to finish.
fn stop(mut child: Child, reader: JoinHandle<()>) {
  let _ = child.kill();
  let _ = child.wait();
  let _ = reader.join();
}

/// Appends the extension's pod declaration. Returns false when the Podfile
/// already has it.
pub fn add_snippet(path: &Path) -> Result<bool> {
  let contents = match fs::read_to_string(path) {
    Ok(x) => x,
    Err(e) if e.kind() == ErrorKind::NotFound => return Err(Error::MissingPodfile(path.to_path_buf())),
    Err(e) => return Err(e.into())
  };

  if contents.contains(PODFILE_SNIPPET) {
    return Ok(false);
  }

  fs::write(path, [contents.as_str(), "\n", PODFILE_SNIPPET].join(""))?;
  Ok(true)
}

/// Removes the extension's pod declaration, if the Podfile exists and has it.
pub fn remove_snippet(path: &Path) -> Result<bool> {
  if !path.is_file() {
    return Ok(false);
  }

  let contents = fs::read_to_string(path)?;
  if !contents.contains(PODFILE_SNIPPET) {
    return Ok(false);
  }

  fs::write(path, contents.replacen(PODFILE_SNIPPET, "", 1))?;
  Ok(true)
}

#[cfg(test)]
mod tests {
  use super::*;

  const PODFILE: &str = "platform :ios, '11.0'\ntarget 'App' do\nend\n";

  #[test]
  fn snippet_is_added_once() {
    let dir  = tempfile::tempdir().unwrap();
    let path = dir.path().join("Podfile");
    fs::write(&path, PODFILE).unwrap();

    assert!(add_snippet(&path).unwrap());
    let once = fs::read_to_string(&path).unwrap();
    assert_eq!(once, [PODFILE, "\n", PODFILE_SNIPPET].join(""));

    assert!(!add_snippet(&path).unwrap());
    assert_eq!(fs::read_to_string(&path).unwrap(), once);
  }

  #[test]
  fn snippet_is_removed_exactly() {
    let dir  = tempfile::tempdir().unwrap();
    let path = dir.path().join("Podfile");
    fs::write(&path, [PODFILE, PODFILE_SNIPPET, "# trailer\n"].join("")).unwrap();

    assert!(remove_snippet(&path).unwrap());
    assert_eq!(fs::read_to_string(&path).unwrap(), [PODFILE, "# trailer\n"].join(""));
    assert!(!remove_snippet(&path).unwrap());
    assert!(!remove_snippet(&dir.path().join("Missing")).unwrap());
  }

  #[test]
  fn missing_podfile_is_an_error_when_adding() {
    let dir = tempfile::tempdir().unwrap();
    assert!(matches!(add_snippet(&dir.path().join("Podfile")), Err(Error::MissingPodfile(_))));
  }

  #[test]
  fn reports_spawn_failures() {
    let dir  = tempfile::tempdir().unwrap();
    let pods = Pods { program: "wonderpush-nse-no-such-pod".to_string(), ..Pods::new(Duration::from_secs(5)) };
    match pods.install(dir.path()) {
      Err(Error::ExternalProcess { command, .. }) => {
        assert_eq!(command, "wonderpush-nse-no-such-pod install --verbose")
      },
      r => panic!("unexpected result {:?}", r)
    }
  }

  #[cfg(unix)]
  #[test]
  fn kills_hung_installs() {
    use std::os::unix::fs::PermissionsExt;

    let dir    = tempfile::tempdir().unwrap();
    let script = dir.path().join("hung-pod");
    fs::write(&script, "#!/bin/sh\nexec sleep 30\n").unwrap();
    fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();

    let pods  = Pods { program: script.to_string_lossy().into_owned(), ..Pods::new(Duration::from_secs(1)) };
    let start = Instant::now();
    match pods.install(dir.path()) {
      Err(Error::ExternalProcess { message, .. }) => assert_eq!(message, "timed out after 1s"),
      r => panic!("unexpected result {:?}", r)
    }
    assert!(start.elapsed() < Duration::from_secs(20));
  }

  #[cfg(unix)]
  #[test]
  fn reports_non_zero_exits() {
    let dir  = tempfile::tempdir().unwrap();
    let pods = Pods { program: "false".to_string(), ..Pods::new(Duration::from_secs(30)) };
    assert!(matches!(pods.install(dir.path()), Err(Error::ExternalProcess { .. })));
  }
}
