//! Pipeline stages for image OCR and document assembly.
//!
//! Each submodule implements exactly one transformation step, so each can be
//! tested on its own and the OCR backend can be swapped without touching the
//! rest.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ normalize ──▶ encode ──▶ ocr ──▶ store
//! (files)   (image→PDF)   (base64)   (HTTP)  (json/)
//!
//! store ──▶ stitch ──▶ compile
//! (json/)   (md + images/)  (pandoc)
//! ```
//!
//! 1. [`input`]     — expand user paths into supported source images
//! 2. [`normalize`] — decode, fold colour mode, write a one-page PDF; runs in
//!    `spawn_blocking` because decoding is CPU-bound
//! 3. [`encode`]    — wrap the PDF as a base64 data URI
//! 4. [`ocr`]       — the only stage with network I/O
//! 5. [`store`]     — one JSON record per item, read back sorted by key
//! 6. [`stitch`]    — merge records, extract images, rewrite references
//! 7. [`compile`]   — run the external compiler on the merged document

pub mod compile;
pub mod encode;
pub mod input;
pub mod normalize;
pub mod ocr;
pub mod stitch;
pub mod store;
