//! 自然序 (natural order) 排序, 使 `subject2` 排在 `subject10` 之前.
//!
//! 字符串被切分为数字段和非数字段, 逐段比较: 数字段按数值比较, 非数字段按字典序比较,
//! 数字段排在非数字段之前. 各段都相同时, 按原字符串字典序决定先后, 保证排序是全序的.

use std::cmp::Ordering;

/// 将 `s` 切分为交替的数字段与非数字段.
fn chunks(s: &str) -> impl Iterator<Item = &str> + '_ {
    let mut rest = s;
    std::iter::from_fn(move || {
        let first = rest.chars().next()?;
        let digit = first.is_ascii_digit();
        let end = rest
            .find(|c: char| c.is_ascii_digit() != digit)
            .unwrap_or(rest.len());
        let (head, tail) = rest.split_at(end);
        rest = tail;
        Some(head)
    })
}

#[inline]
fn is_number(chunk: &str) -> bool {
    chunk.starts_with(|c: char| c.is_ascii_digit())
}

/// 按数值比较两个数字段. 不受位数限制, 前导零不影响数值.
fn cmp_number(a: &str, b: &str) -> Ordering {
    let ta = a.trim_start_matches('0');
    let tb = b.trim_start_matches('0');
    ta.len().cmp(&tb.len()).then_with(|| ta.cmp(tb))
}

/// 自然序比较.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let mut ca = chunks(a);
    let mut cb = chunks(b);
    loop {
        let ord = match (ca.next(), cb.next()) {
            (None, None) => return a.cmp(b),
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) => match (is_number(x), is_number(y)) {
                (true, true) => cmp_number(x, y),
                (true, false) => Ordering::Less,
                (false, true) => Ordering::Greater,
                (false, false) => x.cmp(y),
            },
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
}

/// 按自然序原地排序.
pub fn natural_sort<S: AsRef<str>>(v: &mut [S]) {
    v.sort_by(|a, b| natural_cmp(a.as_ref(), b.as_ref()));
}
