//! Metaphone语音编码算法
//!
//! 将单词编码为语音表示，用于匹配发音相似的单词。
//! 编码是纯函数、无共享状态，可以在任意并发上下文中调用。
//!
//! # 示例
//! ```
//! use verstore::phonetic::{encode, metaphone};
//! assert_eq!(metaphone("Smith"), metaphone("Smyth"));
//! assert_eq!(encode("Smith report"), format!("{} {}", metaphone("Smith"), metaphone("report")));
//! ```

/// Metaphone算法实现（简化版）
///
/// # 规则
/// - 转换为小写
/// - 保留首字母
/// - 处理特殊辅音组合（TH→0, SH→X, PH→F）
/// - 元音只在首字母位置保留
/// - 忽略Y（除非是唯一元音）
/// - 压缩连续相同的字母
pub fn metaphone(word: &str) -> String {
    let word = word.to_lowercase();
    let mut result = String::new();
    let chars: Vec<char> = word.chars().collect();
    let len = chars.len();

    if len == 0 {
        return result;
    }

    let mut i = 0;

    while i < len {
        let c = chars[i];

        match c {
            // 首字母特殊处理
            _ if i == 0 => {
                // 开头的 K 在 N 前不发音
                if c == 'k' && i + 1 < len && chars[i + 1] == 'n' {
                    i += 1;
                    continue;
                }
                result.push(c);
                i += 1;
            }

            // 元音：仅首字母保留
            'a' | 'e' | 'i' | 'o' | 'u' => {
                i += 1;
            }

            // C: CE/CI/CY -> S, 否则 -> K
            'c' => {
                if i + 1 < len {
                    let next = chars[i + 1];
                    if next == 'i' || next == 'e' || next == 'y' {
                        result.push('s'); // soft C
                    } else if next == 'h' && i + 2 < len && chars[i + 2] == ' ' {
                        result.push('k');
                        i += 1;
                    } else {
                        result.push('k'); // hard C
                    }
                } else {
                    result.push('k');
                }
                i += 1;
            }

            // G: GE/GI/GY -> J, GH -> 不发音, 其他 -> K
            'g' => {
                if i + 1 < len {
                    let next = chars[i + 1];
                    if next == 'e' || next == 'i' || next == 'y' {
                        result.push('j'); // soft G
                    } else if next == 'h' {
                        // 跳过 G，让下一个循环处理 H
                        i += 1;
                        continue;
                    } else {
                        result.push('k'); // hard G
                    }
                } else {
                    result.push('k');
                }
                i += 1;
            }

            // H: 只在元音前保留
            'h' => {
                if i + 1 < len {
                    let next = chars[i + 1];
                    if matches!(next, 'a' | 'e' | 'i' | 'o' | 'u') {
                        result.push('h');
                    }
                }
                i += 1;
            }

            // P: PH -> F
            'p' => {
                if i + 1 < len && chars[i + 1] == 'h' {
                    result.push('f');
                    i += 2;
                } else {
                    result.push('p');
                    i += 1;
                }
            }

            // S: SH -> X, 其他 -> S
            's' => {
                if i + 1 < len && chars[i + 1] == 'h' {
                    result.push('x');
                    i += 2;
                } else {
                    result.push('s');
                    i += 1;
                }
            }

            // T: TH -> 0 (数字0), 其他 -> T
            't' => {
                if i + 1 < len && chars[i + 1] == 'h' {
                    result.push('0');
                    i += 2;
                } else {
                    result.push('t');
                    i += 1;
                }
            }

            // W: 只在元音前保留
            'w' => {
                if i + 1 < len {
                    let next = chars[i + 1];
                    if matches!(next, 'a' | 'e' | 'i' | 'o' | 'u') {
                        result.push('w');
                    }
                }
                i += 1;
            }

            // Y: 忽略
            'y' => {
                i += 1;
            }

            // 其他辅音直接保留
            'f' | 'l' | 'm' | 'n' | 'r' | 'b' | 'd' | 'j' | 'k' | 'v' | 'x' | 'z' => {
                result.push(c);
                i += 1;
            }

            // 空格、标点和其他字符：跳过
            _ => {
                i += 1;
            }
        }
    }

    // 压缩连续相同的字符
    result.chars().fold(String::new(), |mut acc, c| {
        if !acc.ends_with(c) {
            acc.push(c);
        }
        acc
    })
}

/// 对整段文本做语音编码
///
/// 按空白分词，每个单词计算一个 metaphone 编码，用单个空格连接。
/// 编码在版本入库时计算一次并原样存储，之后不再重算。
pub fn encode(text: &str) -> String {
    text.split_whitespace()
        .map(metaphone)
        .collect::<Vec<_>>()
        .join(" ")
}
