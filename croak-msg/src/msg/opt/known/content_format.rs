/// Content-Format
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ContentFormat {
  /// `text/plain; charset=utf-8`
  Text,
  /// `application/link-format`
  LinkFormat,
  /// `application/xml`
  Xml,
  /// `application/octet-stream`
  OctetStream,
  /// `application/exi`
  Exi,
  /// `application/json`
  Json,
  /// `application/cbor`
  Cbor,
  /// Another content format
  Other(u16),
}

impl ContentFormat {
  /// Convert this content format to the CoAP byte value
  pub fn bytes(&self) -> [u8; 2] {
    u16::from(self).to_be_bytes()
  }
}

impl<'a> From<&'a ContentFormat> for u16 {
  fn from(f: &'a ContentFormat) -> Self {
    use ContentFormat::*;
    match *f {
      | Text => 0,
      | LinkFormat => 40,
      | Xml => 41,
      | OctetStream => 42,
      | Exi => 47,
      | Json => 50,
      | Cbor => 60,
      | Other(n) => n,
    }
  }
}

impl From<ContentFormat> for u16 {
  fn from(f: ContentFormat) -> Self {
    u16::from(&f)
  }
}

impl From<u16> for ContentFormat {
  fn from(n: u16) -> Self {
    use ContentFormat::*;
    match n {
      | 0 => Text,
      | 40 => LinkFormat,
      | 41 => Xml,
      | 42 => OctetStream,
      | 47 => Exi,
      | 50 => Json,
      | 60 => Cbor,
      | n => Other(n),
    }
  }
}

/// A string that is not a media type this library knows a
/// Content-Format number for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnknownMediaType;

impl core::str::FromStr for ContentFormat {
  type Err = UnknownMediaType;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    use ContentFormat::*;
    match s {
      | "text/plain" | "text/plain; charset=utf-8" => Ok(Text),
      | "application/link-format" => Ok(LinkFormat),
      | "application/xml" => Ok(Xml),
      | "application/octet-stream" => Ok(OctetStream),
      | "application/exi" => Ok(Exi),
      | "application/json" => Ok(Json),
      | "application/cbor" => Ok(Cbor),
      | _ => Err(UnknownMediaType),
    }
  }
}

impl core::fmt::Display for ContentFormat {
  fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
    use ContentFormat::*;
    match self {
      | Text => write!(f, "text/plain; charset=utf-8"),
      | LinkFormat => write!(f, "application/link-format"),
      | Xml => write!(f, "application/xml"),
      | OctetStream => write!(f, "application/octet-stream"),
      | Exi => write!(f, "application/exi"),
      | Json => write!(f, "application/json"),
      | Cbor => write!(f, "application/cbor"),
      | Other(n) => write!(f, "content-format {}", n),
    }
  }
}

impl<'a> IntoIterator for &'a ContentFormat {
  type Item = u8;

  type IntoIter = <[u8; 2] as IntoIterator>::IntoIter;

  fn into_iter(self) -> Self::IntoIter {
    self.bytes().into_iter()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn number_table() {
    let table: [(ContentFormat, u16); 7] = [(ContentFormat::Text, 0),
                                            (ContentFormat::LinkFormat, 40),
                                            (ContentFormat::Xml, 41),
                                            (ContentFormat::OctetStream, 42),
                                            (ContentFormat::Exi, 47),
                                            (ContentFormat::Json, 50),
                                            (ContentFormat::Cbor, 60)];

    for (fmt, n) in table {
      assert_eq!(u16::from(fmt), n);
      assert_eq!(ContentFormat::from(n), fmt);
    }
  }

  #[test]
  fn from_media_type_string() {
    assert_eq!("application/json".parse(), Ok(ContentFormat::Json));
    assert_eq!("application/cbor".parse(), Ok(ContentFormat::Cbor));
    assert_eq!("application/x-rot13".parse::<ContentFormat>(),
               Err(UnknownMediaType));
  }
}
