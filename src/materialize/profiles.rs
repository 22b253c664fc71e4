//! The static [`AgentProfile`] table (§3.6): one entry per target AI
//! assistant. Modeled as concrete data, not reflection, per the duck-typed
//! dispatch re-architecture note — adding a profile is adding a row, never
//! adding a branch to a transformation function.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumString, strum::EnumIter)]
#[strum(serialize_all = "kebab-case")]
pub enum AgentKey {
    Claude,
    Gemini,
    Copilot,
    Cursor,
    Qwen,
    Opencode,
    Windsurf,
    Kilocode,
    Auggie,
    Roo,
    Codex,
    Amazonq,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileExtension {
    Md,
    Toml,
}

impl FileExtension {
    pub fn as_str(self) -> &'static str {
        match self {
            FileExtension::Md => "md",
            FileExtension::Toml => "toml",
        }
    }
}

/// A target AI assistant's materialization contract: where its commands
/// live, what format they're written in, and how `$ARGUMENTS` is spelled
/// for it.
#[derive(Debug, Clone, Copy)]
pub struct AgentProfile {
    pub key: AgentKey,
    pub display_name: &'static str,
    pub command_dir: &'static str,
    pub file_extension: FileExtension,
    pub argument_syntax: Option<&'static str>,
    pub supports_args: bool,
    pub cli_command: Option<&'static str>,
}

/// The shipped roster of target assistants. Order is declaration order,
/// used as-is for `flow init --agent all` and `detect_installed_agents`
/// iteration so output is deterministic.
pub const AGENT_PROFILES: &[AgentProfile] = &[
    AgentProfile {
        key: AgentKey::Claude,
        display_name: "Claude Code",
        command_dir: ".claude/commands",
        file_extension: FileExtension::Md,
        argument_syntax: Some("$ARGUMENTS"),
        supports_args: true,
        cli_command: Some("claude"),
    },
    AgentProfile {
        key: AgentKey::Gemini,
        display_name: "Gemini CLI",
        command_dir: ".gemini/commands",
        file_extension: FileExtension::Toml,
        argument_syntax: Some("{{args}}"),
        supports_args: true,
        cli_command: Some("gemini"),
    },
    AgentProfile {
        key: AgentKey::Copilot,
        display_name: "GitHub Copilot",
        command_dir: ".github/copilot/commands",
        file_extension: FileExtension::Md,
        argument_syntax: Some("$ARGUMENTS"),
        supports_args: true,
        cli_command: None,
    },
    AgentProfile {
        key: AgentKey::Cursor,
        display_name: "Cursor",
        command_dir: ".cursor/commands",
        file_extension: FileExtension::Md,
        argument_syntax: Some("$ARGUMENTS"),
        supports_args: true,
        cli_command: Some("cursor-agent"),
    },
    AgentProfile {
        key: AgentKey::Qwen,
        display_name: "Qwen Code",
        command_dir: ".qwen/commands",
        file_extension: FileExtension::Toml,
        argument_syntax: Some("{{args}}"),
        supports_args: true,
        cli_command: Some("qwen"),
    },
    AgentProfile {
        key: AgentKey::Opencode,
        display_name: "OpenCode",
        command_dir: ".opencode/command",
        file_extension: FileExtension::Toml,
        argument_syntax: Some("{{args}}"),
        supports_args: true,
        cli_command: Some("opencode"),
    },
    AgentProfile {
        key: AgentKey::Windsurf,
        display_name: "Windsurf",
        command_dir: ".windsurf/workflows",
        file_extension: FileExtension::Md,
        argument_syntax: Some("$ARGUMENTS"),
        supports_args: true,
        cli_command: None,
    },
    AgentProfile {
        key: AgentKey::Kilocode,
        display_name: "Kilo Code",
        command_dir: ".kilocode/commands",
        file_extension: FileExtension::Md,
        argument_syntax: Some("$ARGUMENTS"),
        supports_args: true,
        cli_command: None,
    },
    AgentProfile {
        key: AgentKey::Auggie,
        display_name: "Auggie CLI",
        command_dir: ".augment/commands",
        file_extension: FileExtension::Md,
        argument_syntax: Some("$ARGUMENTS"),
        supports_args: true,
        cli_command: Some("auggie"),
    },
    AgentProfile {
        key: AgentKey::Roo,
        display_name: "Roo Code",
        command_dir: ".roo/commands",
        file_extension: FileExtension::Md,
        argument_syntax: Some("$ARGUMENTS"),
        supports_args: true,
        cli_command: None,
    },
    AgentProfile {
        key: AgentKey::Codex,
        display_name: "Codex CLI",
        command_dir: ".codex/prompts",
        file_extension: FileExtension::Toml,
        argument_syntax: Some("$ARGUMENTS"),
        supports_args: true,
        cli_command: Some("codex"),
    },
    AgentProfile {
        key: AgentKey::Amazonq,
        display_name: "Amazon Q Developer",
        command_dir: ".amazonq/prompts",
        file_extension: FileExtension::Md,
        argument_syntax: None,
        supports_args: false,
        cli_command: Some("q"),
    },
];

pub fn profile_for(key: AgentKey) -> &'static AgentProfile {
    AGENT_PROFILES
        .iter()
        .find(|p| p.key == key)
        .expect("AGENT_PROFILES has exactly one entry per AgentKey variant")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_agent_key_has_a_profile() {
        use strum::IntoEnumIterator;
        for key in AgentKey::iter() {
            let profile = profile_for(key);
            assert_eq!(profile.key, key);
        }
    }

    #[test]
    fn roster_has_at_least_eleven_agents() {
        assert!(AGENT_PROFILES.len() >= 11);
    }

    #[test]
    fn agent_without_arg_support_has_no_argument_syntax_requirement() {
        let amazonq = profile_for(AgentKey::Amazonq);
        assert!(!amazonq.supports_args);
    }
}
