//! 提示词模板
//!
//! 提取与翻译两类调用的最小模板。模板要求服务以JSON响应，
//! 具体措辞不属于管道的语义契约。

/// 提取调用的提示词
///
/// 要求服务抽出内容中的自然语言文本，以 `__T0__` 形式的占位键
/// 改写原文，并返回 `{"texts": {...}, "content": "..."}` 结构。
pub fn extraction_prompt(category: &str, content: &str) -> String {
    format!(
        "你是一个国际化改造工具。请从下面的 {category} 源文件中提取所有\
         面向用户的中文文本，将每处文本替换为形如 __T0__、__T1__ 的占位键\
         （按出现顺序编号，同一文件内不得重复使用编号）。\n\
         只返回一个JSON对象，不要附加任何解释，结构为：\n\
         {{\"texts\": {{\"__T0__\": \"原文\", ...}}, \"content\": \"替换后的完整源文件\"}}\n\
         源文件内容：\n{content}"
    )
}

/// 翻译调用的提示词
///
/// 输入 `键 -> 原文` 映射，要求返回 `{"translations": {键: 译文}}`。
pub fn translation_prompt(source_locale: &str, target_locale: &str, payload: &str) -> String {
    format!(
        "请将下面JSON对象中的每个值从 {source_locale} 翻译为 {target_locale}，\
         键保持不变。只返回一个JSON对象，不要附加任何解释，结构为：\n\
         {{\"translations\": {{\"键\": \"译文\", ...}}}}\n\
         待翻译内容：\n{payload}"
    )
}
