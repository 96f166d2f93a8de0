//! Render the plan as an equivalent container build definition.

use std::fmt::Write;

use crate::config::ProvisionConfig;
use crate::plan::{build_plan, Step};

/// Render the provisioning plan as a Dockerfile.
///
/// Each step maps to exactly one instruction, in plan order.
pub fn dockerfile(config: &ProvisionConfig) -> String {
    let mut out = String::new();

    for step in build_plan(config) {
        // Writing to a String cannot fail.
        let _ = writeln!(out, "{}", instruction(&step));
    }

    out
}

fn instruction(step: &Step) -> String {
    match step {
        Step::BaseImage { distro, version } => format!("FROM {}:{}", distro, version),
        Step::RefreshIndex => "RUN apt-get update".to_string(),
        Step::InstallPackages(packages) => format!(
            "RUN DEBIAN_FRONTEND=noninteractive apt-get install -y --no-install-recommends {}",
            packages.join(" ")
        ),
        Step::WorkDir(dir) => format!("WORKDIR {}", dir.display()),
        Step::RunInstaller { url, interpreter } => {
            format!("RUN curl -sSL {} | {} -", url, interpreter)
        }
        Step::ExtendPath(dir) => format!("ENV PATH=\"{}:${{PATH}}\"", dir.display()),
        Step::InstallDependencies { tool, args } => {
            let mut line = format!("RUN {}", tool);
            for arg in args {
                line.push(' ');
                line.push_str(arg);
            }
            line
        }
        Step::SetEnv { name, value } => format!("ENV {}=\"{}\"", name, quote(value)),
    }
}

/// Escape a value for a double-quoted `ENV` string.
fn quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '"' | '\\' | '$') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_dockerfile() {
        let rendered = dockerfile(&ProvisionConfig::default());
        let expected = "\
FROM ubuntu:22.04
RUN apt-get update
RUN DEBIAN_FRONTEND=noninteractive apt-get install -y --no-install-recommends python3-pip git curl unzip
WORKDIR /workspace
RUN curl -sSL https://install.python-poetry.org | python3 -
ENV PATH=\"/root/.local/bin:${PATH}\"
RUN poetry install
ENV force_color_prompt=\"yes\"
";
        assert_eq!(rendered, expected);
    }

    #[test]
    fn test_one_instruction_per_step() {
        let config = ProvisionConfig::default();
        assert_eq!(dockerfile(&config).lines().count(), build_plan(&config).len());
    }

    #[test]
    fn test_env_value_is_escaped() {
        let config = ProvisionConfig {
            env_value: r#"say "hi" $HOME \ done"#.into(),
            ..Default::default()
        };
        let rendered = dockerfile(&config);
        let last = rendered.lines().last().unwrap();
        assert_eq!(last, r#"ENV force_color_prompt="say \"hi\" \$HOME \\ done""#);
        assert_eq!(rendered.lines().count(), build_plan(&config).len());
    }
}
