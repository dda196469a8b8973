//! 键生成模块
//!
//! 将任意文本确定性地转换为稳定、可读的最终键。
//! 中文等CJK文本经拼音罗马化，无法罗马化的输入退化为字符码编码。
//!
//! 读取-判定-写入序列整体持锁执行，不含任何挂起点，
//! 并发任务对同一新文本的键生成不会交错。

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use pinyin::ToPinyin;

use crate::config::KeyConfig;

/// 键生成器内部状态
#[derive(Debug, Default)]
struct KeyState {
    /// 已分配的键集合
    used: HashSet<String>,
    /// 文本到键的记忆表（无论复用策略如何都会记录，支持增量加载）
    memo: HashMap<String, String>,
    /// 运行内一次性随机量，保证禁用复用时同文本多次生成互不相同
    nonce: u64,
}

/// 键生成器
pub struct KeyGenerator {
    config: KeyConfig,
    state: Mutex<KeyState>,
}

impl KeyGenerator {
    /// 创建新的键生成器
    pub fn new(config: KeyConfig) -> Self {
        Self {
            config,
            state: Mutex::new(KeyState::default()),
        }
    }

    /// 从既有的 键 -> 原文 映射中恢复状态，保证增量运行时键保持稳定
    pub fn load_existing(&self, entries: &HashMap<String, String>) {
        let mut state = self.state.lock().unwrap();
        for (key, text) in entries {
            state.used.insert(key.clone());
            state.memo.insert(text.clone(), key.clone());
        }
    }

    /// 为文本生成最终键
    ///
    /// 永不失败：罗马化为空时退化为字符码编码，冲突通过哈希后缀消解。
    pub fn generate_key(&self, text: &str) -> String {
        let mut state = self.state.lock().unwrap();

        if self.config.reuse_existing {
            if let Some(existing) = state.memo.get(text) {
                return existing.clone();
            }
        }

        let sep = self.config.separator;
        let mut key = self.romanize(text);

        if key.chars().count() > self.config.max_length {
            // 哈希取自原始文本而非截断形式，长文本截断到相同前缀仍可区分
            let truncated: String = key.chars().take(self.config.max_length).collect();
            key = format!("{}{}{}", truncated, sep, self.content_hash(text));
        }

        if !self.config.prefix.is_empty() {
            key = format!("{}{}{}", self.config.prefix, sep, key);
        }

        if state.used.contains(&key) {
            key = self.resolve_collision(&mut state, &key, text);
        }

        state.used.insert(key.clone());
        state.memo.insert(text.to_string(), key.clone());
        key
    }

    /// 检查键是否符合前缀与字符集约定（仅用于测试与自检）
    pub fn validate_key(&self, key: &str) -> bool {
        if key.is_empty() {
            return false;
        }
        if !self.config.prefix.is_empty() {
            let expected = format!("{}{}", self.config.prefix, self.config.separator);
            if !key.starts_with(&expected) {
                return false;
            }
        }
        key.chars()
            .all(|c| c.is_ascii_alphanumeric() || c == self.config.separator)
    }

    /// 罗马化：拼音词元 + ASCII字母数字词元，以分隔符连接
    fn romanize(&self, text: &str) -> String {
        let sep = self.config.separator;
        let mut tokens: Vec<String> = Vec::new();
        let mut ascii_run = String::new();

        for ch in text.chars() {
            if let Some(py) = ch.to_pinyin() {
                if !ascii_run.is_empty() {
                    tokens.push(std::mem::take(&mut ascii_run));
                }
                tokens.push(py.plain().to_string());
            } else if ch.is_ascii_alphanumeric() {
                ascii_run.push(ch.to_ascii_lowercase());
            } else if !ascii_run.is_empty() {
                tokens.push(std::mem::take(&mut ascii_run));
            }
        }
        if !ascii_run.is_empty() {
            tokens.push(ascii_run);
        }

        if tokens.is_empty() {
            return self.fallback_encode(text);
        }
        tokens.join(&sep.to_string())
    }

    /// 字符码回退编码：对任何输入都能产出合法键
    fn fallback_encode(&self, text: &str) -> String {
        let sep = self.config.separator;
        text.chars()
            .map(|c| format!("x{:x}", c as u32))
            .collect::<Vec<_>>()
            .join(&sep.to_string())
    }

    /// 原始文本的内容哈希前缀
    fn content_hash(&self, text: &str) -> String {
        let hex = blake3::hash(text.as_bytes()).to_hex().to_string();
        hex[..self.config.hash_length.min(hex.len())].to_string()
    }

    /// 冲突消解
    ///
    /// 复用开启时用确定性的内容哈希后缀（跨运行稳定）；
    /// 复用关闭时混入运行内nonce，同文本反复生成必须得到不同键。
    fn resolve_collision(&self, state: &mut KeyState, base: &str, text: &str) -> String {
        let sep = self.config.separator;
        loop {
            let salted = if self.config.reuse_existing {
                format!("{}#{}", text, state.nonce)
            } else {
                state.nonce = state.nonce.wrapping_add(1);
                format!("{}#{}", text, state.nonce)
            };
            let suffix = {
                let hex = blake3::hash(salted.as_bytes()).to_hex().to_string();
                hex[..self.config.hash_length.min(hex.len())].to_string()
            };
            let candidate = format!("{}{}{}", base, sep, suffix);
            if !state.used.contains(&candidate) {
                return candidate;
            }
            // 后缀也被占用时继续推进nonce
            state.nonce = state.nonce.wrapping_add(1);
        }
    }
}
