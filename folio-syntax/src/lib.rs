/*!
A low-level crate for reading PDF-like documents.

The crate is split into a couple of layers:
- [`object`] contains an owned, cheaply clonable object model. Dictionaries and arrays remember
  the cross-reference table they were parsed from, so indirect references are resolved lazily
  on access.
- [`content`] turns a content stream into a sequence of operands, operators and inline images.
- [`filter`] implements the stream filters that are needed to decode content streams and
  inline images.
- [`function`] evaluates sampled, exponential, stitching and PostScript calculator functions.
- [`document`] loads a complete document and exposes its pages.

## Example
```
use folio_syntax::content::{Token, Tokenizer};

let tokens = Tokenizer::new(b"1 0 0 rg 0 0 1 1 re f").collect::<Vec<_>>();
assert_eq!(tokens.len(), 10);
assert!(matches!(&tokens[3], Token::Operator(op) if op.as_bytes() == b"rg"));
```
*/

#![forbid(unsafe_code)]

pub mod content;
pub mod document;
pub mod filter;
pub mod function;
pub(crate) mod lexer;
pub mod object;
pub mod trivia;
pub(crate) mod util;
pub mod xref;

pub use document::{Document, LoadError, Page, Resources};
pub use folio_common::bit;
pub use folio_common::byte::Reader;
