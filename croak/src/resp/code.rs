pub use croak_msg::Code;

use crate::code;

// 2.xx
code!(#[doc = "[2.01 Created](https://datatracker.ietf.org/doc/html/rfc7252#section-5.9.1.1)"]
      CREATED = 2 * 01);
code!(#[doc = "[2.02 Deleted](https://datatracker.ietf.org/doc/html/rfc7252#section-5.9.1.2)"]
      DELETED = 2 * 02);
code!(#[doc = "[2.03 Valid](https://datatracker.ietf.org/doc/html/rfc7252#section-5.9.1.3)"]
      VALID = 2 * 03);
code!(#[doc = "[2.04 Changed](https://datatracker.ietf.org/doc/html/rfc7252#section-5.9.1.4)"]
      CHANGED = 2 * 04);
code!(#[doc = "[2.05 Content](https://datatracker.ietf.org/doc/html/rfc7252#section-5.9.1.5)"]
      CONTENT = 2 * 05);
code!(
      #[doc = concat!(
    "## [2.31 Continue](https://www.rfc-editor.org/rfc/rfc7959#section-2.9.1)\n",
    "This success status code indicates that the transfer of this\n",
    "block of the request body was successful and that the server\n",
    "encourages sending further blocks, but that a final outcome of the\n",
    "whole block-wise request cannot yet be determined.  No payload is\n",
    "returned with this response code.",
  )]
      CONTINUE = 2 * 31
);

// 4.xx
code!(#[doc = "[4.00 Bad Request](https://datatracker.ietf.org/doc/html/rfc7252#section-5.9.2.1)"]
      BAD_REQUEST = 4 * 00);
code!(#[doc = "[4.01 Unauthorized](https://datatracker.ietf.org/doc/html/rfc7252#section-5.9.2.2)"]
      UNAUTHORIZED = 4 * 01);
code!(#[doc = "[4.02 Bad Option](https://datatracker.ietf.org/doc/html/rfc7252#section-5.9.2.3)"]
      BAD_OPTION = 4 * 02);
code!(#[doc = "[4.03 Forbidden](https://datatracker.ietf.org/doc/html/rfc7252#section-5.9.2.4)"]
      FORBIDDEN = 4 * 03);
code!(#[doc = "[4.04 Not Found](https://datatracker.ietf.org/doc/html/rfc7252#section-5.9.2.5)"]
      NOT_FOUND = 4 * 04);
code!(#[doc = "[4.05 Method Not Allowed](https://datatracker.ietf.org/doc/html/rfc7252#section-5.9.2.6)"]
      METHOD_NOT_ALLOWED = 4 * 05);
code!(#[doc = "[4.06 Not Acceptable](https://datatracker.ietf.org/doc/html/rfc7252#section-5.9.2.7)"]
      NOT_ACCEPTABLE = 4 * 06);
code!(
      #[doc = concat!(
    "## [4.08 Request Entity Incomplete](https://www.rfc-editor.org/rfc/rfc7959#section-2.9.2)\n",
    "This client error status code indicates that the server has not\n",
    "received the blocks of the request body that it needs to proceed.\n",
    "The client has not sent all blocks, not sent them in the order\n",
    "required by the server, or has sent them long enough ago that the\n",
    "server has already discarded them.",
  )]
      REQUEST_ENTITY_INCOMPLETE = 4 * 08
);
code!(#[doc = "[4.12 Precondition Failed](https://datatracker.ietf.org/doc/html/rfc7252#section-5.9.2.8)"]
      PRECONDITION_FAILED = 4 * 12);
code!(#[doc = "[4.13 Request Entity Too Large](https://datatracker.ietf.org/doc/html/rfc7252#section-5.9.2.9)"]
      REQUEST_ENTITY_TOO_LARGE = 4 * 13);
code!(#[doc = "[4.15 Unsupported Content-Format](https://datatracker.ietf.org/doc/html/rfc7252#section-5.9.2.10)"]
      UNSUPPORTED_CONTENT_FORMAT = 4 * 15);

// 5.xx
code!(#[doc = "[5.00 Internal Server Error](https://datatracker.ietf.org/doc/html/rfc7252#section-5.9.3.1)"]
      INTERNAL_SERVER_ERROR = 5 * 00);
code!(#[doc = "[5.01 Not Implemented](https://datatracker.ietf.org/doc/html/rfc7252#section-5.9.3.2)"]
      NOT_IMPLEMENTED = 5 * 01);
code!(#[doc = "[5.02 Bad Gateway](https://datatracker.ietf.org/doc/html/rfc7252#section-5.9.3.3)"]
      BAD_GATEWAY = 5 * 02);
code!(#[doc = "[5.03 Service Unavailable](https://datatracker.ietf.org/doc/html/rfc7252#section-5.9.3.4)"]
      SERVICE_UNAVAILABLE = 5 * 03);
code!(#[doc = "[5.04 Gateway Timeout](https://datatracker.ietf.org/doc/html/rfc7252#section-5.9.3.5)"]
      GATEWAY_TIMEOUT = 5 * 04);
code!(#[doc = "[5.05 Proxying Not Supported](https://datatracker.ietf.org/doc/html/rfc7252#section-5.9.3.6)"]
      PROXYING_NOT_SUPPORTED = 5 * 05);

#[cfg(test)]
mod tests {
  #[test]
  fn status_integers() {
    assert_eq!(super::CONTENT.status(), 205);
    assert_eq!(super::NOT_FOUND.status(), 404);
    assert_eq!(super::INTERNAL_SERVER_ERROR.status(), 500);
    assert_eq!(super::CONTINUE.status(), 231);
  }
}
