use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
#[error("Indices out of range.")]
pub struct IndexOutOfRange;

/// 将 `previous` 位置的元素移到 `current`, 返回 (元素, 新序号) 列表
pub fn move_item<T>(mut items: Vec<T>, previous: i64, current: i64) -> Result<Vec<(T, i32)>, IndexOutOfRange> {
    let len = items.len() as i64;
    if !(0..len).contains(&previous) || !(0..len).contains(&current) {
        return Err(IndexOutOfRange);
    }
    let moving = items.remove(previous as usize);
    items.insert(current as usize, moving);
    Ok(items
        .into_iter()
        .enumerate()
        .map(|(i, item)| (item, i as i32))
        .collect())
}
