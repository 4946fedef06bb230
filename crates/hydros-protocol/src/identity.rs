use rand::Rng;

use crate::constants::*;

const UPPER_ALNUM: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Components of a generated agent instance ID.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentInstanceIdParts<'a> {
    /// `yyyyMMddHHmm` creation minute.
    pub timestamp: &'a str,
    pub random: &'a str,
    pub agent_code: &'a str,
}

fn random_upper_alnum(len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| UPPER_ALNUM[rng.gen_range(0..UPPER_ALNUM.len())] as char)
        .collect()
}

fn minute_stamp() -> String {
    chrono::Local::now().format("%Y%m%d%H%M").to_string()
}

/// Generate a process-unique agent instance ID:
/// `AGT` + `yyyyMMddHHmm` + 6 uppercase alphanumerics + `_` + agent code.
pub fn generate_agent_instance_id(agent_code: &str) -> String {
    format!(
        "{AGENT_ID_PREFIX}{}{}_{agent_code}",
        minute_stamp(),
        random_upper_alnum(AGENT_ID_RANDOM_LEN)
    )
}

/// Generate a command ID: `SIMCMD` + `yyyyMMddHHmm` + 12 uppercase alphanumerics.
pub fn generate_command_id() -> String {
    format!(
        "{COMMAND_ID_PREFIX}{}{}",
        minute_stamp(),
        random_upper_alnum(COMMAND_ID_RANDOM_LEN)
    )
}

/// Split an agent instance ID back into its parts. Returns `None` for IDs
/// not produced by [`generate_agent_instance_id`].
pub fn parse_agent_instance_id(agent_id: &str) -> Option<AgentInstanceIdParts<'_>> {
    let rest = agent_id.strip_prefix(AGENT_ID_PREFIX)?;
    let head_len = ID_TIMESTAMP_LEN + AGENT_ID_RANDOM_LEN;
    if rest.len() < head_len + 2 || !rest.is_char_boundary(head_len) {
        return None;
    }
    let (head, tail) = rest.split_at(head_len);
    let agent_code = tail.strip_prefix('_')?;
    let (timestamp, random) = head.split_at(ID_TIMESTAMP_LEN);

    if !timestamp.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if !random.bytes().all(|b| UPPER_ALNUM.contains(&b)) {
        return None;
    }
    if agent_code.is_empty() {
        return None;
    }
    Some(AgentInstanceIdParts {
        timestamp,
        random,
        agent_code,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_agent_id_format() {
        let id = generate_agent_instance_id("TWINS");
        assert!(id.starts_with("AGT"));
        assert!(id.ends_with("_TWINS"));
        assert_eq!(id.len(), 3 + 12 + 6 + 1 + 5);

        let parts = parse_agent_instance_id(&id).unwrap();
        assert_eq!(parts.agent_code, "TWINS");
        assert_eq!(parts.timestamp.len(), 12);
        assert_eq!(parts.random.len(), 6);
    }

    #[test]
    fn test_agent_code_with_underscore() {
        let id = generate_agent_instance_id("CENTRAL_SCHEDULING");
        assert_eq!(parse_agent_instance_id(&id).unwrap().agent_code, "CENTRAL_SCHEDULING");
    }

    #[test]
    fn test_agent_ids_unique() {
        let a = generate_agent_instance_id("A");
        let b = generate_agent_instance_id("A");
        assert_ne!(a, b);
    }

    #[test]
    fn test_parse_rejects_foreign_ids() {
        assert!(parse_agent_instance_id("agent-1").is_none());
        assert!(parse_agent_instance_id("AGT2024_A").is_none());
        assert!(parse_agent_instance_id("AGT20240101120Xabcdef_A").is_none());
        assert!(parse_agent_instance_id("AGT202401011200ABC123_").is_none());
    }

    #[test]
    fn test_command_id_format() {
        let id = generate_command_id();
        assert!(id.starts_with("SIMCMD"));
        assert_eq!(id.len(), 6 + 12 + 12);
    }
}
