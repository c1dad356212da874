/// One Block1/Block2 descriptor: which piece of a larger body a
/// message carries (or asks for), how big the pieces are, and whether
/// any pieces follow.
///
/// Stored decomposed; the wire form is the RFC7959 unsigned integer
/// `num << 4 | more << 3 | szx` with `size = 2^(szx + 4)`, written
/// like every other uint option as the shortest big-endian byte string
/// (1 byte while `num < 16`, 2 bytes while `num < 4096`, 3-4 beyond).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Block {
  num: u32,
  more: bool,
  szx: u8,
}

/// Largest size exponent the 3-bit SZX field admits (7 is reserved),
/// i.e. 1024-byte blocks.
const SZX_MAX: u8 = 6;

/// The SZX exponent for a requested size in bytes: the largest legal
/// power of two not exceeding it, clamped into {16, ..., 1024}.
fn szx_for(size: u16) -> u8 {
  let clamped = size.clamp(16, 1024);
  // floor(log2(clamped)) - 4
  (15 - clamped.leading_zeros() as u8) - 4
}

impl Block {
  /// Describe block `num` of a body split into `size`-byte pieces.
  ///
  /// `size` is snapped down to the nearest legal block size.
  pub fn new(size: u16, num: u32, more: bool) -> Self {
    Self { num,
           more,
           szx: szx_for(size) }
  }

  /// Block size in bytes; one of {16, 32, 64, 128, 256, 512, 1024}.
  pub fn size(&self) -> u16 {
    1u16 << (self.szx + 4)
  }

  /// Whether further blocks follow this one.
  pub fn more(&self) -> bool {
    self.more
  }

  /// Position of this block within the body, in units of [`Block::size`].
  pub fn num(&self) -> u32 {
    self.num
  }

  /// Whether this descriptor says "first and only block", which is
  /// interchangeable with no block-wise transfer at all and may be
  /// elided from the wire.
  pub fn is_trivial(&self) -> bool {
    self.num == 0 && !self.more
  }

  /// Re-pack with the same number & more-flag at a (normally smaller)
  /// size requested by the peer.
  pub fn with_size(&self, size: u16) -> Self {
    Self { szx: szx_for(size),
           ..*self }
  }
}

impl From<Block> for u32 {
  fn from(b: Block) -> Self {
    b.num << 4 | u32::from(b.more) << 3 | b.szx as u32
  }
}

impl From<u32> for Block {
  fn from(raw: u32) -> Self {
    Block { num: raw >> 4,
            more: raw & 0b1000 != 0,
            // the reserved exponent 7 reads as the largest real size
            szx: ((raw & 0b111) as u8).min(SZX_MAX) }
  }
}

#[cfg(test)]
mod test {
  use super::*;

  #[test]
  fn wire_packing() {
    // num 5, more, 64-byte blocks: 0b101_1_010
    assert_eq!(u32::from(Block::new(64, 5, true)), 0b101_1_010);
    assert_eq!(Block::from(0b101_1_010), Block::new(64, 5, true));

    // num 0, final, 16-byte blocks is all zeroes
    assert_eq!(u32::from(Block::new(16, 0, false)), 0);

    let b = Block::from(0b10_0_110);
    assert_eq!((b.num(), b.more(), b.size()), (2, false, 1024));
  }

  #[test]
  fn reserved_exponent_reads_as_1024() {
    assert_eq!(Block::from(0b0_111).size(), 1024);
  }

  #[test]
  fn size_snaps_down_to_a_legal_block_size() {
    for (requested, got) in [(0, 16), (17, 16), (100, 64), (512, 512), (1000, 512),
                             (u16::MAX, 1024)]
    {
      assert_eq!(Block::new(requested, 0, false).size(), got);
    }
  }

  #[test]
  fn with_size_keeps_position() {
    let b = Block::new(1024, 7, true).with_size(256);
    assert_eq!((b.num(), b.more(), b.size()), (7, true, 256));
  }

  #[test]
  fn trivial() {
    assert!(Block::new(512, 0, false).is_trivial());
    assert!(!Block::new(512, 0, true).is_trivial());
    assert!(!Block::new(512, 1, false).is_trivial());
  }

  #[test]
  fn wire_width_tracks_number_magnitude() {
    use crate::OptValue;

    let width =
      |num: u32| OptValue::uint(u32::from(Block::new(16, num, true)) as u64).0.len();

    assert_eq!(width(15), 1);
    assert_eq!(width(16), 2);
    assert_eq!(width(4095), 2);
    assert_eq!(width(4096), 3);
  }
}
