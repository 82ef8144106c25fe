//! 频道路由 - 根据 project/owner 决定哪些频道接收事件

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};

/// 单个频道的路由规则
///
/// `project` 中以 `*` 结尾的项是前缀通配，匹配该前缀下的所有项目（不看 owner）；
/// 其余项需要与项目名完全相等，且 owner 在 `owner` 列表中。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RoutingRule {
    pub project: HashSet<String>,
    pub owner: HashSet<String>,
}

impl RoutingRule {
    pub fn matches(&self, project: &str, owner: &str) -> bool {
        self.project.iter().any(|p| {
            p.strip_suffix('*')
                .is_some_and(|prefix| project.starts_with(prefix))
        }) || (self.project.contains(project) && self.owner.contains(owner))
    }
}

/// 路由表：频道名 -> 规则
#[derive(Debug, Clone, Default)]
pub struct RoutingTable {
    channels: BTreeMap<String, RoutingRule>,
}

impl RoutingTable {
    pub fn new(channels: BTreeMap<String, RoutingRule>) -> Self {
        Self { channels }
    }

    /// 从 JSON 对象构建路由表
    ///
    /// 每个频道必须同时有 `project` 和 `owner` 两个列表，否则报错（启动时致命）
    pub fn from_json(value: &serde_json::Value) -> Result<Self> {
        let map = value
            .as_object()
            .context("`channels` must be an object of channel name -> rule")?;

        let mut channels = BTreeMap::new();
        for (name, rule) in map {
            let rule: RoutingRule = serde_json::from_value(rule.clone())
                .with_context(|| format!("Invalid routing rule for channel `{}`", name))?;
            channels.insert(name.clone(), rule);
        }

        Ok(Self { channels })
    }

    /// 返回应该收到该事件的频道；空集合合法
    pub fn destinations_for(&self, project: &str, owner: &str) -> BTreeSet<String> {
        self.channels
            .iter()
            .filter(|(_, rule)| rule.matches(project, owner))
            .map(|(name, _)| name.clone())
            .collect()
    }

    pub fn all_channels(&self) -> Vec<&str> {
        self.channels.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }
}
