//! 占位键替换阶段
//!
//! 将提取调用产出的占位键整词替换为最终键。替换采用单趟
//! 交替正则、长键优先，一个占位键是另一个前缀时不会误伤。

use std::collections::{HashMap, HashSet};

use regex::Regex;

/// 替换结果
#[derive(Debug)]
pub struct TransformOutcome {
    /// 改写后的内容
    pub content: String,
    /// 实际替换到内容中的值集合
    pub used: HashSet<String>,
}

/// 将内容中的每个占位键替换为映射的目标值
///
/// 本阶段不做任何语义校验；内容正确性交由外部校验协作者判定。
pub fn apply_key_mapping(content: &str, mapping: &HashMap<String, String>) -> TransformOutcome {
    if mapping.is_empty() {
        return TransformOutcome {
            content: content.to_string(),
            used: HashSet::new(),
        };
    }

    // 长键在前：交替分支按序尝试，前缀关系的占位键不会被短键抢先命中
    let mut placeholders: Vec<&String> = mapping.keys().collect();
    placeholders.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));

    let pattern = placeholders
        .iter()
        .map(|p| regex::escape(p))
        .collect::<Vec<_>>()
        .join("|");
    let regex = match Regex::new(&pattern) {
        Ok(r) => r,
        Err(e) => {
            // 占位键经过转义，编译失败属于异常情况，保守地原样返回
            tracing::warn!("占位键正则编译失败，内容未改写: {}", e);
            return TransformOutcome {
                content: content.to_string(),
                used: HashSet::new(),
            };
        }
    };

    let mut used = HashSet::new();
    let rewritten = regex.replace_all(content, |caps: &regex::Captures<'_>| {
        let placeholder = caps.get(0).map(|m| m.as_str()).unwrap_or_default();
        match mapping.get(placeholder) {
            Some(replacement) => {
                used.insert(replacement.clone());
                replacement.clone()
            }
            None => placeholder.to_string(),
        }
    });

    TransformOutcome {
        content: rewritten.into_owned(),
        used,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapping(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_basic_substitution() {
        let mapping = mapping(&[("__T0__", "ti_jiao")]);
        let outcome = apply_key_mapping(r#"call("__T0__")"#, &mapping);
        assert_eq!(outcome.content, r#"call("ti_jiao")"#);
        assert!(outcome.used.contains("ti_jiao"));
    }

    #[test]
    fn test_prefix_placeholders_do_not_collide() {
        let mapping = mapping(&[("__T1__", "short"), ("__T1__EXTRA__", "long")]);
        let outcome = apply_key_mapping("a __T1__EXTRA__ b __T1__ c", &mapping);
        assert_eq!(outcome.content, "a long b short c");
        assert_eq!(outcome.used.len(), 2);
    }

    #[test]
    fn test_repeated_placeholder_replaced_everywhere() {
        let mapping = mapping(&[("__T0__", "qu_xiao")]);
        let outcome = apply_key_mapping(r#"t("__T0__") + t("__T0__")"#, &mapping);
        assert_eq!(outcome.content, r#"t("qu_xiao") + t("qu_xiao")"#);
    }

    #[test]
    fn test_empty_mapping_is_identity() {
        let outcome = apply_key_mapping("unchanged", &HashMap::new());
        assert_eq!(outcome.content, "unchanged");
        assert!(outcome.used.is_empty());
    }
}
