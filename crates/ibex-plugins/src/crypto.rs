//! Hashes, base-N encodings and ROT13.

use std::fmt;
use std::str::FromStr;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use ibex_framework::prelude::*;
use sha2::Digest;

pub fn processor() -> RuleResult<Processor> {
    Processor::builder("crypto")
        .feature("crypto")
        .usage("(md5|sha1|sha224|sha256|sha384|sha512) <text> | b(16|32|64)(enc|dec)ode <text> | rot13 <text>")
        .rule(on_pattern(r"^(md5|sha1|sha224|sha256|sha384|sha512)\s+(.+?)$").handler(hash))
        .rule(on_pattern(r"^b(16|32|64)(enc|dec)(?:ode)?\s+(.+?)$").handler(base_n))
        .rule(on_pattern(r"^rot13\s+(.+)$").handler(rot13))
        .build()
}

// ─── Hashes ───────────────────────────────────────────────────────────────────

/// Supported digest algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashAlgorithm {
    Md5,
    Sha1,
    Sha224,
    Sha256,
    Sha384,
    Sha512,
}

impl HashAlgorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Md5 => "md5",
            Self::Sha1 => "sha1",
            Self::Sha224 => "sha224",
            Self::Sha256 => "sha256",
            Self::Sha384 => "sha384",
            Self::Sha512 => "sha512",
        }
    }

    /// Lowercase hex digest of `input`.
    pub fn hex_digest(self, input: &[u8]) -> String {
        let digest = match self {
            Self::Md5 => md5::Md5::digest(input).to_vec(),
            Self::Sha1 => sha1::Sha1::digest(input).to_vec(),
            Self::Sha224 => sha2::Sha224::digest(input).to_vec(),
            Self::Sha256 => sha2::Sha256::digest(input).to_vec(),
            Self::Sha384 => sha2::Sha384::digest(input).to_vec(),
            Self::Sha512 => sha2::Sha512::digest(input).to_vec(),
        };
        digest.iter().map(|b| format!("{b:02x}")).collect()
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HashAlgorithm {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "md5" => Ok(Self::Md5),
            "sha1" => Ok(Self::Sha1),
            "sha224" => Ok(Self::Sha224),
            "sha256" => Ok(Self::Sha256),
            "sha384" => Ok(Self::Sha384),
            "sha512" => Ok(Self::Sha512),
            other => anyhow::bail!("unsupported hash algorithm '{other}'"),
        }
    }
}

async fn hash(ctx: Arc<HandlerContext>, args: Captures) -> anyhow::Result<()> {
    let algorithm: HashAlgorithm = args.str(0).parse()?;
    ctx.add_response(algorithm.hex_digest(args.str(1).as_bytes()));
    Ok(())
}

// ─── Base-N ───────────────────────────────────────────────────────────────────

/// RFC 4648 base32 alphabet.
const BASE32_ALPHABET: &[u8; 32] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ234567";

fn base32_encode(input: &[u8]) -> String {
    let mut out = String::with_capacity(input.len().div_ceil(5) * 8);
    let mut bits = 0u32;
    let mut count = 0u32;
    for &byte in input {
        bits = ((bits << 8) | u32::from(byte)) & 0xFFFF;
        count += 8;
        while count >= 5 {
            count -= 5;
            out.push(BASE32_ALPHABET[((bits >> count) & 0x1F) as usize] as char);
        }
    }
    if count > 0 {
        out.push(BASE32_ALPHABET[((bits << (5 - count)) & 0x1F) as usize] as char);
    }
    while out.len() % 8 != 0 {
        out.push('=');
    }
    out
}

fn base32_decode(input: &str) -> Option<Vec<u8>> {
    let mut out = Vec::new();
    let mut bits = 0u32;
    let mut count = 0u32;
    for c in input.trim_end_matches('=').bytes() {
        let value = BASE32_ALPHABET
            .iter()
            .position(|&a| a == c.to_ascii_uppercase())?;
        bits = ((bits << 5) | value as u32) & 0xFFFF;
        count += 5;
        if count >= 8 {
            count -= 8;
            out.push((bits >> count) as u8);
        }
    }
    Some(out)
}

/// Accepts either case.
fn hex_decode(input: &str) -> Option<Vec<u8>> {
    if input.len() % 2 != 0 || !input.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    (0..input.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&input[i..i + 2], 16).ok())
        .collect()
}

fn encode(base: &str, input: &[u8]) -> String {
    match base {
        "16" => input.iter().map(|b| format!("{b:02X}")).collect(),
        "32" => base32_encode(input),
        _ => BASE64.encode(input),
    }
}

fn decode(base: &str, input: &str) -> Option<String> {
    let bytes = match base {
        "16" => hex_decode(input)?,
        "32" => base32_decode(input)?,
        _ => BASE64.decode(input).ok()?,
    };
    String::from_utf8(bytes).ok()
}

async fn base_n(ctx: Arc<HandlerContext>, args: Captures) -> anyhow::Result<()> {
    let base = args.str(0);
    let text = args.str(2);
    if args.str(1).eq_ignore_ascii_case("enc") {
        ctx.add_response(encode(base, text.as_bytes()));
    } else {
        match decode(base, text) {
            Some(decoded) => ctx.add_response(decoded),
            None => ctx.add_response(format!("That isn't valid base{base} text")),
        }
    }
    Ok(())
}

// ─── ROT13 ────────────────────────────────────────────────────────────────────

pub fn rotate13(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            'a'..='z' => (((c as u8 - b'a') + 13) % 26 + b'a') as char,
            'A'..='Z' => (((c as u8 - b'A') + 13) % 26 + b'A') as char,
            _ => c,
        })
        .collect()
}

async fn rot13(ctx: Arc<HandlerContext>, args: Captures) {
    ctx.add_response(rotate13(args.str(0)));
}
