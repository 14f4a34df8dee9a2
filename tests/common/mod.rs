// Shared by several test binaries; not all of them use every helper.
#![allow(dead_code)]

use assert_cmd::Command;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

/// Default fixture: two countries, forward references, every contact
/// kind, and a head-of-family fold.
pub const SOURCE: &str = "\
# family address book

%country US cc=1 ap=1 U.S.A.
%area 417 Springfield
%country AU cc=61 ap=0 sp=1 Australia
%area 8 South Australia

%default in Springfield

person John Smith
aka Johnny
key friend
head Smith Family
works Acme Pty Ltd
email john@example.com
ph 555-1234
mob +61 411-123-456

person Marge Bouvier
of Smith Family
key friend
email marge@example.com

family Smith Family
ph 555-8707

org Acme Pty Ltd
in South Australia
email office@acme.example
ph 8123-4567
";

pub struct TestEnv {
    _tmp: TempDir,
    pub source: PathBuf,
}

impl TestEnv {
    pub fn new() -> Self {
        Self::with_source(SOURCE)
    }

    pub fn with_source(text: &str) -> Self {
        let tmp = TempDir::new().expect("create temp dir");
        let source = tmp.path().join("book.six");
        fs::write(&source, text).expect("write fixture source");
        Self { _tmp: tmp, source }
    }

    pub fn cache_path(&self) -> PathBuf {
        self.source.with_file_name(".cache-book.six")
    }

    pub fn cmd(&self) -> Command {
        let mut cmd = Command::cargo_bin("six").expect("six binary");
        cmd.env("SIX_SOURCE", &self.source).env_remove("SIX_LOCAL");
        cmd
    }

    /// Run expecting success, return stdout.
    pub fn run(&self, args: &[&str]) -> String {
        let out = self
            .cmd()
            .args(args)
            .assert()
            .success()
            .get_output()
            .stdout
            .clone();
        String::from_utf8(out).expect("utf8 report output")
    }
}
