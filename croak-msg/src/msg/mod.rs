use core::str::{from_utf8, Utf8Error};

use tinyvec::ArrayVec;

use crate::cursor::Cursor;
use crate::from_bytes::{TryConsumeBytes, TryFromBytes};

/// Message Code
pub mod code;

/// Message parsing errors
pub mod parse_error;

/// Message ID
pub mod id;

/// Message Options
pub mod opt;

/// Message Type
pub mod ty;

/// Message Token
pub mod token;

/// Message Version
pub mod ver;

pub use code::*;
pub use id::*;
pub use opt::*;
pub use parse_error::*;
pub use token::*;
pub use ty::*;
pub use ver::*;

/// The request/response body carried after the payload marker.
///
/// An empty payload is encoded as nothing at all; the marker only
/// appears when at least one payload byte follows.
#[derive(Default, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Payload(pub Vec<u8>);

impl Payload {
  /// Convert a reference to a Payload to a byte slice
  pub fn as_bytes(&self) -> &[u8] {
    &self.0
  }
}

/// Struct representing the first byte of a message.
///
/// ```text
/// CoAP version
/// |
/// |  Message type (con, non, ack, reset)
/// |  |
/// |  |  Length of token, in bytes. (4-bit integer)
/// |  |  |
/// vv vv vvvv
/// 01 00 0000
/// ```
#[derive(Clone, Copy, Debug, PartialEq, PartialOrd, Eq, Ord)]
pub(crate) struct Byte1 {
  pub(crate) ver: Version,
  pub(crate) ty: Type,
  pub(crate) tkl: u8,
}

impl TryFrom<u8> for Byte1 {
  type Error = MessageParseError;

  fn try_from(b: u8) -> Result<Self, Self::Error> {
    let ver = b >> 6; // bits 0 & 1
    let ty = b >> 4 & 0b11; // bits 2 & 3
    let tkl = b & 0b1111u8; // last 4 bits

    Ok(Byte1 { ver: Version(ver),
               ty: Type::try_from(ty)?,
               tkl })
  }
}

impl From<Byte1> for u8 {
  fn from(b: Byte1) -> u8 {
    let ver = b.ver.0 << 6;
    let ty = u8::from(b.ty) << 4;
    let tkl = b.tkl;

    ver | ty | tkl
  }
}

/// # CoAP Messages
/// This struct provides a high-level API for manipulating requests &
/// responses, while still being cheaply serializable to & from the byte
/// layout of CoAP messages on the wire.
///
/// ## Options
/// Options (the CoAP equivalent to HTTP headers) are stored as opaque
/// byte strings keyed by number; typed accessors for the options known
/// to this library (`set_path`, `block1`, `content_format`, ...) do the
/// uint/block/flag conversions.
///
/// ## Constructing
/// [`Message::new`] is the most straightforward way to initialize
/// messages; being one of the few structs in this library with public
/// fields you may also use a struct literal.
///
/// ```
/// use croak_msg::{Code, Id, Message, Token, Type};
///
/// let mut msg = Message::new(Type::Con, Code::GET, Id(1), Token::default());
/// msg.set_path("temperature/basement").unwrap();
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Message {
  /// see [`Id`] for details
  pub id: Id,
  /// see [`Type`] for details
  pub ty: Type,
  /// see [`Version`] for details
  pub ver: Version,
  /// see [`Token`] for details
  pub token: Token,
  /// see [`Code`] for details
  pub code: Code,
  /// see [`opt::OptionMap`] for details
  pub opts: OptionMap,
  /// see [`Payload`]
  pub payload: Payload,
}

/// An error occurred during a call to [`Message::add`] or [`Message::set`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetOptionError {
  /// The option number may only occur once per message
  /// (see [`opt::known::repeatable`]) and a second value was added.
  NotRepeatable(OptNumber),
}

impl Message {
  /// Create a new message
  pub fn new(ty: Type, code: Code, id: Id, token: Token) -> Self {
    Self { id,
           token,
           ty,
           code,
           ver: Version::default(),
           payload: Payload(Default::default()),
           opts: OptionMap::default() }
  }

  /// Create the empty ack matching this message.
  ///
  /// Echoes this message's [`Id`], carries no token, no code, no
  /// payload. Piggybacking a response onto the ack is done by the
  /// layers above.
  pub fn ack(&self) -> Self {
    Self { id: self.id,
           token: Token::default(),
           ver: Default::default(),
           ty: Type::Ack,
           code: Code::EMPTY,
           payload: Payload(Default::default()),
           opts: Default::default() }
  }

  /// Create the reset matching this message, for peers that sent us
  /// something we lack the context to process.
  pub fn reset(&self) -> Self {
    Self { id: self.id,
           token: Token::default(),
           ver: Default::default(),
           ty: Type::Reset,
           code: Code::EMPTY,
           payload: Payload(Default::default()),
           opts: Default::default() }
  }

  /// Number of bytes this message will occupy on the wire.
  pub fn wire_size(&self) -> usize {
    let mut prev = OptNumber(0);
    let mut opts_size = 0usize;

    for (num, values) in &self.opts {
      for v in values {
        opts_size += opt::opt_wire_size((num.0 - prev.0) as u16, v.0.len());
        prev = *num;
      }
    }

    let payload_size = match self.payload.0.len() {
      | 0 => 0,
      | n => n + 1,
    };

    4 + self.token.0.len() + opts_size + payload_size
  }

  /// Insert a new value for a given option, alongside any
  /// existing values.
  ///
  /// Errors when the option is not repeatable and already set.
  pub fn add(&mut self, n: OptNumber, v: OptValue) -> Result<(), SetOptionError> {
    let values = self.opts.entry(n).or_default();

    if !values.is_empty() && !known::repeatable(n) {
      return Err(SetOptionError::NotRepeatable(n));
    }

    values.push(v);
    Ok(())
  }

  /// Replace any / all existing values with a new one,
  /// yielding the previous value(s)
  pub fn set(&mut self, n: OptNumber, v: OptValue) -> Option<Vec<OptValue>> {
    let old = self.opts.remove(&n);
    self.opts.insert(n, vec![v]);
    old
  }

  /// Remove all values for the option from this message,
  /// returning them if there were any.
  pub fn remove(&mut self, n: OptNumber) -> Option<Vec<OptValue>> {
    self.opts.remove(&n)
  }

  /// Get the value(s) of an option by number
  pub fn get(&self, n: OptNumber) -> Option<&Vec<OptValue>> {
    self.opts.get(&n)
  }

  /// Get the value of an option, taking the first if there are multiple.
  pub fn get_first(&self, n: OptNumber) -> Option<&OptValue> {
    self.get(n).and_then(|vs| vs.first())
  }

  /// Get the number of values for a given option
  pub fn count(&self, n: OptNumber) -> usize {
    self.get(n).map(|vs| vs.len()).unwrap_or(0)
  }

  /// Get the value of an option, and interpret it as a UTF-8 string
  pub fn get_str(&self, n: OptNumber) -> Result<Option<&str>, Utf8Error> {
    match self.get_first(n) {
      | Some(v) => from_utf8(&v.0).map(Some),
      | _ => Ok(None),
    }
  }

  /// Get all values for an option, and interpret them as UTF-8 strings
  pub fn get_strs<'a, F>(&'a self, n: OptNumber) -> Result<F, Utf8Error>
    where F: FromIterator<&'a str>
  {
    match self.get(n) {
      | Some(vs) => vs.iter().map(|v| from_utf8(&v.0)).collect(),
      | _ => Ok(core::iter::empty().collect()),
    }
  }

  /// Get the value of an option, and interpret it as a
  /// shortest-big-endian unsigned integer
  pub fn get_uint(&self, n: OptNumber) -> Option<u64> {
    self.get_first(n).and_then(|v| v.as_uint())
  }

  /// Set an option to an unsigned integer value,
  /// discarding any existing values.
  pub fn set_uint(&mut self, n: OptNumber, value: u64) {
    self.set(n, OptValue::uint(value));
  }

  /// Update the value for the Uri-Host option,
  /// discarding any existing values.
  ///
  /// ```
  /// use croak_msg::{Code, Id, Message, Token, Type};
  ///
  /// let mut msg = Message::new(Type::Con, Code::GET, Id(1), Token::default());
  ///
  /// msg.set_host("cheese.com");
  /// assert_eq!(msg.host(), Ok(Some("cheese.com")));
  /// ```
  pub fn set_host<S>(&mut self, host: S)
    where S: AsRef<str>
  {
    self.set(known::no_repeat::HOST, OptValue::from(host.as_ref()));
  }

  /// Get the value for the Uri-Host option
  pub fn host(&self) -> Result<Option<&str>, Utf8Error> {
    self.get_str(known::no_repeat::HOST)
  }

  /// Update the value for the Uri-Port option,
  /// discarding any existing values.
  pub fn set_port(&mut self, port: u16) {
    self.set_uint(known::no_repeat::PORT, port as u64);
  }

  /// Get the value for the Uri-Port option
  pub fn port(&self) -> Option<u16> {
    self.get_uint(known::no_repeat::PORT).map(|n| n as u16)
  }

  /// Update the value for the Uri-Path option, discarding any
  /// existing values. Empty segments are discarded.
  ///
  /// ```
  /// use croak_msg::{Code, Id, Message, Token, Type};
  ///
  /// let mut msg = Message::new(Type::Con, Code::GET, Id(1), Token::default());
  ///
  /// msg.set_path("cheese//havarti/").unwrap();
  /// assert_eq!(msg.path::<Vec<_>>(), Ok(vec!["cheese", "havarti"]));
  /// ```
  pub fn set_path<S>(&mut self, path: S) -> Result<(), SetOptionError>
    where S: AsRef<str>
  {
    self.remove(known::repeat::PATH);
    path.as_ref()
        .split('/')
        .filter(|segment| !segment.is_empty())
        .try_for_each(|segment| self.add(known::repeat::PATH, OptValue::from(segment)))
  }

  /// Get an iterator over the Uri-Path segments
  pub fn path<'a, F>(&'a self) -> Result<F, Utf8Error>
    where F: FromIterator<&'a str>
  {
    self.get_strs(known::repeat::PATH)
  }

  /// Get the fully built path, joining segments with '/'.
  pub fn path_string(&self) -> Result<String, Utf8Error> {
    self.path::<Vec<_>>().map(|segs| segs.join("/"))
  }

  /// Insert a new value for the Uri-Query option,
  /// alongside any existing values.
  pub fn add_query<S>(&mut self, query: S) -> Result<(), SetOptionError>
    where S: AsRef<str>
  {
    self.add(known::repeat::QUERY, OptValue::from(query.as_ref()))
  }

  /// Get all query parameters for this request
  pub fn query<'a, F>(&'a self) -> Result<F, Utf8Error>
    where F: FromIterator<&'a str>
  {
    self.get_strs(known::repeat::QUERY)
  }

  /// Update the value for the Content-Format option,
  /// discarding any existing values.
  pub fn set_content_format(&mut self, format: ContentFormat) {
    self.set_uint(known::no_repeat::CONTENT_FORMAT, u16::from(format) as u64);
  }

  /// Get the value for the Content-Format option
  pub fn content_format(&self) -> Option<ContentFormat> {
    self.get_uint(known::no_repeat::CONTENT_FORMAT)
        .map(|n| ContentFormat::from(n as u16))
  }

  /// Update the value for the Accept option,
  /// discarding any existing values.
  pub fn set_accept(&mut self, format: ContentFormat) {
    self.set_uint(known::no_repeat::ACCEPT, u16::from(format) as u64);
  }

  /// Get the value for the Accept option
  pub fn accept(&self) -> Option<ContentFormat> {
    self.get_uint(known::no_repeat::ACCEPT)
        .map(|n| ContentFormat::from(n as u16))
  }

  /// Set the value for the Observe option,
  /// discarding any existing values.
  ///
  /// This library carries Observe opaquely; registrations have no
  /// special lifecycle.
  pub fn set_observe(&mut self, n: u32) {
    self.set_uint(known::no_repeat::OBSERVE, n as u64);
  }

  /// Get the value for the Observe option
  pub fn observe(&self) -> Option<u32> {
    self.get_uint(known::no_repeat::OBSERVE).map(|n| n as u32)
  }

  /// Update the value for the Max-Age option,
  /// discarding any existing values.
  pub fn set_max_age(&mut self, max_age_seconds: u32) {
    self.set_uint(known::no_repeat::MAX_AGE, max_age_seconds as u64);
  }

  /// Get the value for the Max-Age option, in seconds
  pub fn max_age_seconds(&self) -> Option<u32> {
    self.get_uint(known::no_repeat::MAX_AGE).map(|n| n as u32)
  }

  /// Update the value for the Size1 option,
  /// discarding any existing values.
  pub fn set_size1(&mut self, size_bytes: u64) {
    self.set_uint(known::no_repeat::SIZE1, size_bytes);
  }

  /// Get the value for the Size1 option
  pub fn size1(&self) -> Option<u64> {
    self.get_uint(known::no_repeat::SIZE1)
  }

  /// Update the value for the Size2 option,
  /// discarding any existing values.
  pub fn set_size2(&mut self, size_bytes: u64) {
    self.set_uint(known::no_repeat::SIZE2, size_bytes);
  }

  /// Get the value for the Size2 option
  pub fn size2(&self) -> Option<u64> {
    self.get_uint(known::no_repeat::SIZE2)
  }

  /// Set the Block1 option (block-wise descriptor for the request body)
  pub fn set_block1(&mut self, block: Block) {
    self.set_uint(known::no_repeat::BLOCK1, u32::from(block) as u64);
  }

  /// Get the Block1 option
  pub fn block1(&self) -> Option<Block> {
    self.get_uint(known::no_repeat::BLOCK1)
        .map(|n| Block::from(n as u32))
  }

  /// Set the Block2 option (block-wise descriptor for the response body)
  pub fn set_block2(&mut self, block: Block) {
    self.set_uint(known::no_repeat::BLOCK2, u32::from(block) as u64);
  }

  /// Get the Block2 option
  pub fn block2(&self) -> Option<Block> {
    self.get_uint(known::no_repeat::BLOCK2)
        .map(|n| Block::from(n as u32))
  }

  /// Enable the If-None-Match flag
  ///
  /// This signals that our request should only be processed if we're
  /// trying to insert a resource that does not exist (e.g. this ensures
  /// PUT only inserts and will never update)
  pub fn set_if_not_exists(&mut self) {
    self.set(known::no_repeat::IF_NONE_MATCH, OptValue::default());
  }

  /// Get whether or not [`Message::set_if_not_exists`] applies.
  ///
  /// Any presence of If-None-Match counts, even the technically
  /// malformed presence-with-a-value.
  pub fn if_not_exists_flag_enabled(&self) -> bool {
    self.get_first(known::no_repeat::IF_NONE_MATCH).is_some()
  }

  /// Insert a new value for the If-Match option,
  /// alongside any existing values.
  pub fn add_if_match<B>(&mut self, tag: B) -> Result<(), SetOptionError>
    where B: AsRef<[u8]>
  {
    self.add(known::repeat::IF_MATCH, OptValue::from(tag.as_ref()))
  }

  /// Get all values for the If-Match option
  pub fn if_match(&self) -> Option<&Vec<OptValue>> {
    self.get(known::repeat::IF_MATCH)
  }

  /// Insert a new value for the ETag option,
  /// alongside any existing values.
  pub fn add_etag<B>(&mut self, tag: B) -> Result<(), SetOptionError>
    where B: AsRef<[u8]>
  {
    self.add(known::repeat::ETAG, OptValue::from(tag.as_ref()))
  }

  /// Get all values for the ETag option
  pub fn etags(&self) -> Option<&Vec<OptValue>> {
    self.get(known::repeat::ETAG)
  }

  /// Insert a new value for the Location-Path option,
  /// alongside any existing values.
  pub fn add_location_path<S>(&mut self, path: S) -> Result<(), SetOptionError>
    where S: AsRef<str>
  {
    self.add(known::repeat::LOCATION_PATH, OptValue::from(path.as_ref()))
  }

  /// Get all values for the Location-Path option
  pub fn location_path<'a, F>(&'a self) -> Result<F, Utf8Error>
    where F: FromIterator<&'a str>
  {
    self.get_strs(known::repeat::LOCATION_PATH)
  }

  /// Insert a new value for the Location-Query option,
  /// alongside any existing values.
  pub fn add_location_query<S>(&mut self, query: S) -> Result<(), SetOptionError>
    where S: AsRef<str>
  {
    self.add(known::repeat::LOCATION_QUERY, OptValue::from(query.as_ref()))
  }

  /// Get all values for the Location-Query option
  pub fn location_query<'a, F>(&'a self) -> Result<F, Utf8Error>
    where F: FromIterator<&'a str>
  {
    self.get_strs(known::repeat::LOCATION_QUERY)
  }
}

impl<Bytes: AsRef<[u8]>> TryFromBytes<Bytes> for Message {
  type Error = MessageParseError;

  fn try_from_bytes(bytes: Bytes) -> Result<Self, Self::Error> {
    let mut bytes = Cursor::new(bytes);

    let Byte1 { tkl, ty, ver } = bytes.next()
                                      .ok_or(MessageParseError::ShortHeader)?
                                      .try_into()?;

    if tkl > 8 {
      return Err(Self::Error::BadTokenLength(tkl));
    }

    let code: Code = bytes.next().ok_or(MessageParseError::ShortHeader)?.into();
    let id: Id = Id::try_consume_bytes(&mut bytes)?;

    let token = bytes.take_exact(tkl as usize)
                     .ok_or(MessageParseError::ShortHeader)?;
    let token = ArrayVec::<[u8; 8]>::try_from(token).expect("tkl was checked to be <= 8");
    let token = Token(token);

    let (opts, saw_marker) = opt::try_consume_options(&mut bytes)?;

    let payload = Payload(bytes.take_until_end().to_vec());

    if saw_marker && payload.0.is_empty() {
      return Err(Self::Error::TrailingPayloadMarker);
    }

    Ok(Message { id,
                 ty,
                 ver,
                 code,
                 token,
                 opts,
                 payload })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::TryIntoBytes;

  #[test]
  fn parse_msg() {
    let (expect, bytes) = crate::test_msg();
    assert_eq!(Message::try_from_bytes(&bytes).unwrap(), expect)
  }

  #[test]
  fn parse_byte1() {
    let byte = 0b_01_10_0011u8;
    let byte = Byte1::try_from(byte).unwrap();
    assert_eq!(byte,
               Byte1 { ver: Version(1),
                       ty: Type::Ack,
                       tkl: 3 })
  }

  #[test]
  fn parse_id() {
    let mut id_bytes = Cursor::new(34u16.to_be_bytes());
    let id = Id::try_consume_bytes(&mut id_bytes).unwrap();
    assert_eq!(id, Id(34));
  }

  #[test]
  fn parse_con_put_with_path_query_and_payload() {
    let bytes = [&[0x44u8, 0x03, 0x31, 0xFC, 0x7B, 0x5C, 0xD3, 0xDE, 0xB8] as &[u8],
                 b"resource",
                 &[0x49],
                 b"who=world",
                 &[0xFF],
                 b"payload"].concat();

    let msg = Message::try_from_bytes(&bytes).unwrap();

    assert_eq!(msg.ver, Version(1));
    assert_eq!(msg.ty, Type::Con);
    assert_eq!(msg.code, Code::PUT);
    assert_eq!(msg.id, Id(0x31FC));
    assert_eq!(msg.token, Token::from_bytes(&[0x7B, 0x5C, 0xD3, 0xDE]));
    assert_eq!(msg.path::<Vec<_>>(), Ok(vec!["resource"]));
    assert_eq!(msg.query::<Vec<_>>(), Ok(vec!["who=world"]));
    assert_eq!(msg.payload.as_bytes(), b"payload");
  }

  #[test]
  fn parse_short_header() {
    assert_eq!(Message::try_from_bytes(&[] as &[u8]),
               Err(MessageParseError::ShortHeader));
    assert_eq!(Message::try_from_bytes(&[0x44u8, 0x03, 0x31] as &[u8]),
               Err(MessageParseError::ShortHeader));
    // tkl says 4 bytes of token, only 2 present
    assert_eq!(Message::try_from_bytes(&[0x44u8, 0x03, 0x31, 0xFC, 1, 2] as &[u8]),
               Err(MessageParseError::ShortHeader));
  }

  #[test]
  fn parse_bad_token_length() {
    assert_eq!(Message::try_from_bytes(&[0x49u8, 0x03, 0x31, 0xFC] as &[u8]),
               Err(MessageParseError::BadTokenLength(9)));
  }

  #[test]
  fn parse_marker_with_no_payload() {
    assert_eq!(Message::try_from_bytes(&[0x40u8, 0x03, 0x31, 0xFC, 0xFF] as &[u8]),
               Err(MessageParseError::TrailingPayloadMarker));
  }

  #[test]
  fn add_rejects_second_value_for_non_repeatable() {
    let mut msg = Message::new(Type::Con, Code::GET, Id(1), Token::default());
    msg.add(known::no_repeat::HOST, OptValue::from("a")).unwrap();
    assert_eq!(msg.add(known::no_repeat::HOST, OptValue::from("b")),
               Err(SetOptionError::NotRepeatable(known::no_repeat::HOST)));

    msg.add(known::repeat::QUERY, OptValue::from("a=1")).unwrap();
    msg.add(known::repeat::QUERY, OptValue::from("b=2")).unwrap();
    assert_eq!(msg.count(known::repeat::QUERY), 2);
  }

  #[test]
  fn round_trip_preserves_repeated_option_order() {
    let mut msg = Message::new(Type::Con, Code::POST, Id(9), Token::from_bytes(&[1]));
    msg.set_path("z/a/mm").unwrap();
    msg.add_query("zz=1").unwrap();
    msg.add_query("aa=2").unwrap();

    let bytes = msg.clone().try_into_bytes().unwrap();
    let parsed = Message::try_from_bytes(&bytes).unwrap();

    assert_eq!(parsed.path::<Vec<_>>(), Ok(vec!["z", "a", "mm"]));
    assert_eq!(parsed.query::<Vec<_>>(), Ok(vec!["zz=1", "aa=2"]));
    assert_eq!(parsed, msg);
  }

  #[test]
  fn ack_echoes_id_and_nothing_else() {
    let mut msg = Message::new(Type::Con, Code::GET, Id(77), Token::from_bytes(&[1, 2]));
    msg.payload = Payload(b"body".to_vec());

    let ack = msg.ack();
    assert_eq!(ack.id, Id(77));
    assert_eq!(ack.ty, Type::Ack);
    assert_eq!(ack.code, Code::EMPTY);
    assert_eq!(ack.token, Token::default());
    assert!(ack.payload.0.is_empty());
  }

  #[test]
  fn wire_size_matches_encoded_length() {
    let (msg, bytes) = crate::test_msg();
    assert_eq!(msg.wire_size(), bytes.len());

    let empty = Message::new(Type::Reset, Code::EMPTY, Id(0), Token::default());
    assert_eq!(empty.wire_size(), 4);
  }
}
