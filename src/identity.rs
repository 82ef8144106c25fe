//! Gerrit 用户名 -> Slack 用户名映射

use std::collections::HashMap;

/// 身份查询
pub trait IdentityLookup: Send + Sync {
    /// 返回 Gerrit 用户对应的聊天用户名（不含 `@`）
    fn chat_handle_for(&self, username: &str) -> String;
}

/// 基于配置别名表的身份查询，未配置的用户沿用 Gerrit 用户名
#[derive(Debug, Clone, Default)]
pub struct AliasMap {
    aliases: HashMap<String, String>,
}

impl AliasMap {
    pub fn new(aliases: HashMap<String, String>) -> Self {
        Self { aliases }
    }

    pub fn len(&self) -> usize {
        self.aliases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.aliases.is_empty()
    }
}

impl IdentityLookup for AliasMap {
    fn chat_handle_for(&self, username: &str) -> String {
        self.aliases
            .get(username)
            .cloned()
            .unwrap_or_else(|| username.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alias_lookup() {
        let aliases = AliasMap::new(HashMap::from([("bob".to_string(), "bobby".to_string())]));
        assert_eq!(aliases.chat_handle_for("bob"), "bobby");
        assert_eq!(aliases.chat_handle_for("alice"), "alice");
    }
}
