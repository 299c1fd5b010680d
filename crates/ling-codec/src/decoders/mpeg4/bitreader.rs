//! 位流读取器与起始码查找
//!
//! MSB-first 位序游标. 读取函数返回 `Option`, 在模块边界处转换为
//! 类型化错误; 越过缓冲区末尾一律返回 `None`, 不会越界访问.

use log::warn;

/// 位流读取器
pub(super) struct BitReader<'a> {
    data: &'a [u8],
    byte_pos: usize,
    bit_pos: u8,
}

impl<'a> BitReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            byte_pos: 0,
            bit_pos: 0,
        }
    }

    /// 读取 n 位 (最多 32 位)
    pub fn read_bits(&mut self, n: u8) -> Option<u32> {
        if n == 0 || n > 32 {
            return None;
        }
        let mut result = 0u32;
        let mut remaining = n;
        while remaining > 0 {
            if self.byte_pos >= self.data.len() {
                return None;
            }
            let available = 8 - self.bit_pos;
            let take = remaining.min(available);
            let byte = self.data[self.byte_pos];
            let mask = if take >= 8 { 0xFF } else { (1u8 << take) - 1 };
            let shift = available - take;
            let bits = (byte >> shift) & mask;
            result = result.checked_shl(take as u32).unwrap_or(0) | (bits as u32);
            self.bit_pos += take;
            if self.bit_pos >= 8 {
                self.byte_pos += 1;
                self.bit_pos = 0;
            }
            remaining -= take;
        }
        Some(result)
    }

    /// 窥视 n 位 (不消耗)
    pub fn peek_bits(&self, n: u8) -> Option<u32> {
        if n == 0 || n > 32 {
            return None;
        }
        let mut result = 0u32;
        let mut byte_pos = self.byte_pos;
        let mut bit_pos = self.bit_pos;
        for _ in 0..n {
            if byte_pos >= self.data.len() {
                return None;
            }
            let bit = (self.data[byte_pos] >> (7 - bit_pos)) & 1;
            result = (result << 1) | (bit as u32);
            bit_pos += 1;
            if bit_pos >= 8 {
                bit_pos = 0;
                byte_pos += 1;
            }
        }
        Some(result)
    }

    /// 跳过 n 位
    pub fn skip_bits(&mut self, n: u32) {
        let total_bits = self.byte_pos as u32 * 8 + self.bit_pos as u32 + n;
        self.byte_pos = (total_bits / 8) as usize;
        self.bit_pos = (total_bits % 8) as u8;
    }

    /// 读取单个位
    pub fn read_bit(&mut self) -> Option<bool> {
        self.read_bits(1).map(|b| b != 0)
    }

    /// 读取 marker bit (标准要求为 1)
    ///
    /// 为 0 时记录警告但不中断, 与宽容解码策略一致; 调用方在严格
    /// 场合自行检查返回值.
    pub fn check_marker(&mut self, what: &str) -> bool {
        match self.read_bit() {
            Some(true) => true,
            Some(false) => {
                warn!("marker bit 缺失: {what}");
                false
            }
            None => false,
        }
    }

    /// 获取剩余可读位数
    pub fn bits_left(&self) -> usize {
        if self.byte_pos >= self.data.len() {
            return 0;
        }
        (self.data.len() - self.byte_pos) * 8 - self.bit_pos as usize
    }

    /// 获取当前字节位置
    pub fn byte_position(&self) -> usize {
        self.byte_pos
    }

    /// 获取当前位位置
    pub fn bit_position(&self) -> usize {
        self.byte_pos * 8 + self.bit_pos as usize
    }

    /// 到下一个字节边界的位数
    pub fn bits_to_byte_align(&self) -> u8 {
        if self.bit_pos == 0 { 0 } else { 8 - self.bit_pos }
    }

    /// 重定位到绝对位位置 (用于解析回退)
    pub fn seek_to_bit(&mut self, pos: usize) {
        self.byte_pos = pos / 8;
        self.bit_pos = (pos % 8) as u8;
    }

    /// 字节对齐
    pub fn align_to_byte(&mut self) {
        if self.bit_pos != 0 {
            self.byte_pos += 1;
            self.bit_pos = 0;
        }
    }
}

// ============================================================================
// 起始码查找
// ============================================================================

/// 查找特定起始码 (00 00 01 target), 返回起始码之后的偏移
pub(super) fn find_start_code_offset(data: &[u8], target: u8) -> Option<usize> {
    if data.len() < 4 {
        return None;
    }
    for idx in 0..(data.len() - 3) {
        if data[idx] == 0x00
            && data[idx + 1] == 0x00
            && data[idx + 2] == 0x01
            && data[idx + 3] == target
        {
            return Some(idx + 4);
        }
    }
    None
}

/// 从 `from` 开始查找任意起始码 (00 00 01 xx), 返回 (码值, 码后偏移)
pub(super) fn find_next_start_code(data: &[u8], from: usize) -> Option<(u8, usize)> {
    if data.len() < 4 || from + 4 > data.len() {
        return None;
    }
    for idx in from..(data.len() - 3) {
        if data[idx] == 0x00 && data[idx + 1] == 0x00 && data[idx + 2] == 0x01 {
            return Some((data[idx + 3], idx + 4));
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_and_peek() {
        let data = [0b1011_0001, 0b0101_0101];
        let mut br = BitReader::new(&data);
        assert_eq!(br.peek_bits(4), Some(0b1011));
        assert_eq!(br.read_bits(4), Some(0b1011));
        assert_eq!(br.read_bits(4), Some(0b0001));
        assert_eq!(br.read_bits(8), Some(0b0101_0101));
        assert_eq!(br.read_bits(1), None);
    }

    #[test]
    fn test_skip_and_align() {
        let data = [0xFF, 0x0F, 0xAA];
        let mut br = BitReader::new(&data);
        br.skip_bits(3);
        assert_eq!(br.bits_to_byte_align(), 5);
        br.align_to_byte();
        assert_eq!(br.byte_position(), 1);
        assert_eq!(br.read_bits(8), Some(0x0F));
    }

    #[test]
    fn test_bits_left_clamped_at_end() {
        let data = [0x00];
        let mut br = BitReader::new(&data);
        br.skip_bits(16); // 越过末尾
        assert_eq!(br.bits_left(), 0);
        assert_eq!(br.read_bits(1), None);
    }

    #[test]
    fn test_find_start_codes() {
        let data = [0x00, 0x00, 0x01, 0xB6, 0x12, 0x00, 0x00, 0x01, 0x20];
        assert_eq!(find_start_code_offset(&data, 0xB6), Some(4));
        assert_eq!(find_next_start_code(&data, 1), Some((0x20, 9)));
        assert_eq!(find_next_start_code(&data, 9), None);
    }
}
