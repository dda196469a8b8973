//! 提取结果过滤器
//!
//! 外部服务偶尔会把数字、URL之类的非文案内容当作文本抽出来，
//! 这类条目在进入键生成与聚合存储前被丢弃。

use std::sync::OnceLock;

use regex::Regex;

/// 文本过滤器
#[derive(Debug, Default)]
pub struct TextFilter;

impl TextFilter {
    pub fn new() -> Self {
        Self
    }

    /// 判断提取出的文本是否值得保留
    pub fn should_keep(&self, text: &str) -> bool {
        let trimmed = text.trim();

        if trimmed.is_empty() {
            return false;
        }

        // 必须包含至少一个字母类字符（含CJK）
        if !trimmed.chars().any(|c| c.is_alphabetic()) {
            return false;
        }

        if self.is_url(trimmed) || self.is_email(trimmed) {
            return false;
        }

        // 纯代码标识符（camelCase/snake_case等ASCII词）不是文案
        if self.is_identifier(trimmed) {
            return false;
        }

        true
    }

    fn is_url(&self, text: &str) -> bool {
        static URL: OnceLock<Regex> = OnceLock::new();
        URL.get_or_init(|| Regex::new(r"^[a-zA-Z][a-zA-Z0-9+.-]*://\S+$").unwrap())
            .is_match(text)
    }

    fn is_email(&self, text: &str) -> bool {
        static EMAIL: OnceLock<Regex> = OnceLock::new();
        EMAIL
            .get_or_init(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap())
            .is_match(text)
    }

    fn is_identifier(&self, text: &str) -> bool {
        static IDENT: OnceLock<Regex> = OnceLock::new();
        IDENT
            .get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap())
            .is_match(text)
            && !text.contains(' ')
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keeps_natural_language() {
        let filter = TextFilter::new();
        assert!(filter.should_keep("提交"));
        assert!(filter.should_keep("确认删除该条目？"));
        assert!(filter.should_keep("Save draft"));
    }

    #[test]
    fn test_drops_numbers_and_symbols() {
        let filter = TextFilter::new();
        assert!(!filter.should_keep("12345"));
        assert!(!filter.should_keep("3.14"));
        assert!(!filter.should_keep("---"));
        assert!(!filter.should_keep("   "));
    }

    #[test]
    fn test_drops_urls_and_emails() {
        let filter = TextFilter::new();
        assert!(!filter.should_keep("https://example.com/path"));
        assert!(!filter.should_keep("user@example.com"));
    }

    #[test]
    fn test_drops_code_identifiers() {
        let filter = TextFilter::new();
        assert!(!filter.should_keep("handleSubmit"));
        assert!(!filter.should_keep("user_id"));
    }
}
