//! Parsing of `go install` command lines

use rgo_foundation::{RgoError, RgoResult};

/// A `go install` command together with the binary it produces
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallSpec {
    /// The full command line, as configured
    pub command: String,
    /// Package path without the `@version` suffix
    pub package: String,
    /// Name of the binary `go install` writes to `$GOPATH/bin`
    pub binary_name: String,
}

impl InstallSpec {
    /// Parse `go install [flags] <package>[@version]`
    ///
    /// The binary name is the last element of the package path. A trailing
    /// major-version element (`/v2`) is skipped, matching how `go install`
    /// names binaries built from versioned module paths.
    pub fn parse(command: &str) -> RgoResult<Self> {
        let invalid = |reason: &str| {
            RgoError::install(format!("Invalid install command '{}': {}", command, reason))
        };

        let mut tokens = command.split_whitespace();
        if tokens.next() != Some("go") || tokens.next() != Some("install") {
            return Err(invalid("expected `go install <package>`"));
        }

        let target = tokens
            .find(|token| !token.starts_with('-'))
            .ok_or_else(|| invalid("missing package path"))?;

        let package = target.split('@').next().unwrap_or_default();
        if package.is_empty() || package.ends_with("/...") {
            return Err(invalid("package path must name a single command"));
        }

        let mut segments = package.rsplit('/').filter(|s| !s.is_empty());
        let last = segments.next().ok_or_else(|| invalid("empty package path"))?;
        let binary_name = if is_major_version(last) {
            segments.next().unwrap_or(last)
        } else {
            last
        };

        // Security: the name is joined onto a directory later
        if binary_name == ".." || binary_name.contains('\\') {
            return Err(invalid("binary name contains path separators"));
        }

        Ok(Self {
            command: command.to_string(),
            package: package.to_string(),
            binary_name: binary_name.to_string(),
        })
    }

    /// File name of the binary on the current platform
    pub fn executable_name(&self) -> String {
        format!("{}{}", self.binary_name, std::env::consts::EXE_SUFFIX)
    }
}

fn is_major_version(segment: &str) -> bool {
    segment
        .strip_prefix('v')
        .is_some_and(|rest| !rest.is_empty() && rest.chars().all(|c| c.is_ascii_digit()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_versioned_command() {
        let spec =
            InstallSpec::parse("go install github.com/cloudwego-contrib/rgo/cmd/rgo_lsp_server@latest")
                .unwrap();
        assert_eq!(spec.package, "github.com/cloudwego-contrib/rgo/cmd/rgo_lsp_server");
        assert_eq!(spec.binary_name, "rgo_lsp_server");
    }

    #[test]
    fn test_parse_without_version_and_with_flags() {
        let spec = InstallSpec::parse("go install -v  example.com/tools/driver").unwrap();
        assert_eq!(spec.binary_name, "driver");
    }

    #[test]
    fn test_major_version_suffix_is_skipped() {
        let spec = InstallSpec::parse("go install example.com/tool/v2@v2.1.0").unwrap();
        assert_eq!(spec.binary_name, "tool");
    }

    #[test]
    fn test_rejects_non_go_install() {
        assert!(InstallSpec::parse("curl https://example.com/install.sh").is_err());
        assert!(InstallSpec::parse("go build ./...").is_err());
        assert!(InstallSpec::parse("").is_err());
    }

    #[test]
    fn test_rejects_missing_or_wildcard_package() {
        assert!(InstallSpec::parse("go install").is_err());
        assert!(InstallSpec::parse("go install -v").is_err());
        assert!(InstallSpec::parse("go install @latest").is_err());
        assert!(InstallSpec::parse("go install example.com/cmd/...@latest").is_err());
    }

    #[test]
    fn test_executable_name_uses_platform_suffix() {
        let spec = InstallSpec::parse("go install example.com/cmd/rgo@latest").unwrap();
        assert_eq!(
            spec.executable_name(),
            format!("rgo{}", std::env::consts::EXE_SUFFIX)
        );
    }
}
