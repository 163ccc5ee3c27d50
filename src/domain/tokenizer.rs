//! 分词器
//!
//! 边界计算与高亮渲染共用同一套分词规则，保证两边的单词下标一致

/// 将文本切分为显示单词
///
/// 规则：
/// 1. 按行分割（支持 \n 和 \r\n）
/// 2. 每行按连续空白分割
/// 3. 丢弃空片段，按原顺序拼接
///
/// 空文本返回空序列（表示"无可高亮内容"，不是错误）
pub fn tokenize(text: &str) -> Vec<&str> {
    text.lines()
        .flat_map(|line| line.split_whitespace())
        .collect()
}

/// 单词数量（与 `tokenize(text).len()` 一致，不分配内存）
pub fn token_count(text: &str) -> usize {
    text.lines().map(|line| line.split_whitespace().count()).sum()
}
