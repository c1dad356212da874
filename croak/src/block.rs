use std::collections::BTreeMap;

use croak_msg::{Block, CodeKind, Message};

/// Errors raised while reassembling a block-wise transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockError {
  /// Two different payloads arrived for the same block number
  Conflict {
    /// block number that conflicted
    num: u32,
  },
  /// The final block arrived but earlier numbers are missing
  Gap {
    /// first missing block number
    missing: u32,
  },
}

/// An outbound payload carved into blocks.
///
/// Yields `(bytes, descriptor)` pairs in order; honors mid-transfer
/// size changes requested by the peer (the byte offset is kept, so a
/// new smaller size re-numbers the remaining blocks).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segments {
  payload: Vec<u8>,
  size: u16,
  offset: usize,
}

impl Segments {
  /// Carve `payload` into blocks of `size` bytes.
  ///
  /// A zero-length payload yields exactly one empty segment.
  pub fn new(payload: Vec<u8>, size: u16) -> Self {
    Self { payload,
           size: Block::new(size, 0, false).size(),
           offset: 0 }
  }

  /// Negotiated block size
  pub fn size(&self) -> u16 {
    self.size
  }

  /// Total payload length in bytes
  pub fn total_len(&self) -> usize {
    self.payload.len()
  }

  /// Adopt a peer-requested block size for the remaining blocks.
  ///
  /// Only ever shrinks; a peer asking to grow the block size is
  /// ignored. The current byte offset is always aligned to the new
  /// (power of two) size because it is a multiple of the old one.
  pub fn set_size(&mut self, size: u16) {
    let size = Block::new(size, 0, false).size();
    if size < self.size {
      self.size = size;
    }
  }

  /// The `(bytes, descriptor)` for block `num` at the current size,
  /// without advancing; None when `num` is past the end.
  pub fn segment(&self, num: u32) -> Option<(Vec<u8>, Block)> {
    let size = self.size as usize;
    let start = num as usize * size;

    if start >= self.payload.len() && !(num == 0 && self.payload.is_empty()) {
      return None;
    }

    let end = (start + size).min(self.payload.len());
    let more = end < self.payload.len();

    Some((self.payload[start..end].to_vec(), Block::new(self.size, num, more)))
  }

  /// The next `(bytes, descriptor)` to transmit, or None when the
  /// whole payload has been yielded.
  pub fn next_segment(&mut self) -> Option<(Vec<u8>, Block)> {
    if self.offset > 0 && self.offset >= self.payload.len() {
      return None;
    }

    let size = self.size as usize;
    let end = (self.offset + size).min(self.payload.len());
    let num = (self.offset / size) as u32;
    let more = end < self.payload.len();

    let bytes = self.payload[self.offset..end].to_vec();
    self.offset = if end > self.offset { end } else { end + 1 };

    Some((bytes, Block::new(self.size, num, more)))
  }
}

/// An inbound payload accumulating block by block.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Assembler {
  pieces: BTreeMap<u32, Vec<u8>>,
}

impl Assembler {
  /// Create an empty assembler
  pub fn new() -> Self {
    Self::default()
  }

  /// Whether any blocks have been stored yet
  pub fn is_empty(&self) -> bool {
    self.pieces.is_empty()
  }

  /// Store one block.
  ///
  /// Duplicates of a block we already hold are ignored when the bytes
  /// agree and rejected when they don't. When `block.more()` is clear
  /// the accumulated payload is verified gap-free, concatenated in
  /// block-number order and returned.
  pub fn push(&mut self, block: Block, bytes: &[u8]) -> Result<Option<Vec<u8>>, BlockError> {
    let num = block.num();

    match self.pieces.get(&num) {
      | Some(held) if held != bytes => return Err(BlockError::Conflict { num }),
      | Some(_) => (),
      | None => {
        self.pieces.insert(num, bytes.to_vec());
      },
    }

    if block.more() {
      return Ok(None);
    }

    for (expected, actual) in self.pieces.keys().enumerate() {
      if *actual != expected as u32 {
        return Err(BlockError::Gap { missing: expected as u32 });
      }
    }

    let pieces = std::mem::take(&mut self.pieces);
    Ok(Some(pieces.into_values().flatten().collect()))
  }
}

/// The block descriptors on one message, named by role rather than by
/// option number.
///
/// `description` says what this message's payload is a piece of;
/// `control` says what the next message from the peer should carry. On
/// requests description lives in Block1 and control in Block2; on
/// responses the roles invert.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Multipart {
  /// Descriptor of the payload carried by this message
  pub description: Option<Block>,
  /// Descriptor requested of the peer's next message
  pub control: Option<Block>,
}

impl Multipart {
  /// Read the block options of a message into role terms.
  pub fn of(msg: &Message) -> Self {
    match msg.code.kind() {
      | CodeKind::Request => Multipart { description: msg.block1(),
                                         control: msg.block2() },
      | _ => Multipart { description: msg.block2(),
                         control: msg.block1() },
    }
  }

  /// Write role terms back to the block options of a message.
  ///
  /// Trivial descriptors (block zero, no more to follow) carry no
  /// information and are elided from the wire.
  pub fn apply(&self, msg: &mut Message) {
    let (description, control) = (self.description.filter(|b| !b.is_trivial()),
                                  self.control.filter(|b| !b.is_trivial()));

    let (desc_set, ctrl_set): (fn(&mut Message, Block), fn(&mut Message, Block)) =
      match msg.code.kind() {
        | CodeKind::Request => (Message::set_block1, Message::set_block2),
        | _ => (Message::set_block2, Message::set_block1),
      };

    if let Some(b) = description {
      desc_set(msg, b);
    }
    if let Some(b) = control {
      ctrl_set(msg, b);
    }
  }
}

#[cfg(test)]
mod tests {
  use croak_msg::{Code, Id, Token, Type};

  use super::*;

  #[test]
  fn segments_carve_in_order() {
    let mut segs = Segments::new((0u8..=99).collect(), 32);

    let (bytes, block) = segs.next_segment().unwrap();
    assert_eq!(bytes, (0u8..32).collect::<Vec<_>>());
    assert_eq!((block.num(), block.more(), block.size()), (0, true, 32));

    let (bytes, block) = segs.next_segment().unwrap();
    assert_eq!(bytes, (32u8..64).collect::<Vec<_>>());
    assert_eq!((block.num(), block.more()), (1, true));

    let _ = segs.next_segment().unwrap();

    let (bytes, block) = segs.next_segment().unwrap();
    assert_eq!(bytes, (96u8..=99).collect::<Vec<_>>());
    assert_eq!((block.num(), block.more()), (3, false));

    assert_eq!(segs.next_segment(), None);
  }

  #[test]
  fn segments_of_empty_payload_yield_one_empty_block() {
    let mut segs = Segments::new(vec![], 512);

    let (bytes, block) = segs.next_segment().unwrap();
    assert!(bytes.is_empty());
    assert_eq!((block.num(), block.more()), (0, false));

    assert_eq!(segs.next_segment(), None);
  }

  #[test]
  fn segments_honor_peer_shrinking_the_size() {
    let mut segs = Segments::new(vec![7u8; 96], 32);

    let (_, block) = segs.next_segment().unwrap();
    assert_eq!((block.num(), block.size()), (0, 32));

    // peer asked for 16-byte blocks; offset 32 renumbers to block 2 of 16
    segs.set_size(16);
    let (bytes, block) = segs.next_segment().unwrap();
    assert_eq!(bytes.len(), 16);
    assert_eq!((block.num(), block.size(), block.more()), (2, 16, true));

    // growing is ignored
    segs.set_size(1024);
    let (_, block) = segs.next_segment().unwrap();
    assert_eq!(block.size(), 16);
  }

  #[test]
  fn assembler_reconstructs_any_split() {
    let payload: Vec<u8> = (0u8..=255).cycle().take(1000).collect();

    for size in [16u16, 64, 256, 1024] {
      let mut segs = Segments::new(payload.clone(), size);
      let mut asm = Assembler::new();
      let mut out = None;

      while let Some((bytes, block)) = segs.next_segment() {
        out = asm.push(block, &bytes).unwrap();
      }

      assert_eq!(out.as_ref(), Some(&payload));
    }
  }

  #[test]
  fn assembler_tolerates_equal_duplicates() {
    let mut asm = Assembler::new();
    assert_eq!(asm.push(Block::new(16, 0, true), b"0123456789abcdef"),
               Ok(None));
    assert_eq!(asm.push(Block::new(16, 0, true), b"0123456789abcdef"),
               Ok(None));
    assert_eq!(asm.push(Block::new(16, 1, false), b"done"),
               Ok(Some(b"0123456789abcdefdone".to_vec())));
  }

  #[test]
  fn assembler_rejects_conflicts() {
    let mut asm = Assembler::new();
    asm.push(Block::new(16, 0, true), b"aaaa").unwrap();
    assert_eq!(asm.push(Block::new(16, 0, true), b"bbbb"),
               Err(BlockError::Conflict { num: 0 }));
  }

  #[test]
  fn assembler_rejects_gaps() {
    let mut asm = Assembler::new();
    asm.push(Block::new(16, 0, true), b"aaaa").unwrap();
    assert_eq!(asm.push(Block::new(16, 2, false), b"cccc"),
               Err(BlockError::Gap { missing: 1 }));
  }

  #[test]
  fn multipart_roles_follow_message_direction() {
    let mut req = Message::new(Type::Con, Code::POST, Id(1), Token::default());
    req.set_block1(Block::new(512, 1, true));
    req.set_block2(Block::new(512, 0, true));

    let parts = Multipart::of(&req);
    assert_eq!(parts.description, Some(Block::new(512, 1, true)));
    assert_eq!(parts.control, Some(Block::new(512, 0, true)));

    let mut resp = Message::new(Type::Ack, Code::new(2, 5), Id(1), Token::default());
    Multipart { description: Some(Block::new(512, 3, false)),
                control: Some(Block::new(512, 2, true)) }.apply(&mut resp);

    assert_eq!(resp.block2(), Some(Block::new(512, 3, false)));
    assert_eq!(resp.block1(), Some(Block::new(512, 2, true)));
  }

  #[test]
  fn multipart_elides_trivial_blocks() {
    let mut req = Message::new(Type::Con, Code::GET, Id(1), Token::default());
    Multipart { description: Some(Block::new(512, 0, false)),
                control: None }.apply(&mut req);

    assert_eq!(req.block1(), None);
    assert_eq!(req.block2(), None);
  }
}
