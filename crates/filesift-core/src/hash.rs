//! 摘要计算（流式 MD5）
use md5::{Digest, Md5};
use std::io::{self, Read};

use crate::rules::Md5Digest;

/// 单次读取的缓冲大小；内存占用与文件大小无关
const HASH_BUF_SIZE: usize = 64 * 1024;

/// 以固定缓冲流式计算 MD5
pub fn md5_reader<R: Read + ?Sized>(reader: &mut R) -> io::Result<Md5Digest> {
    md5_stream(reader, u64::MAX).map(|(digest, _)| digest)
}

/// 同 `md5_reader`，但最多读取 `cap` 字节；流超过上限时返回 None
pub fn md5_reader_capped<R: Read + ?Sized>(reader: &mut R, cap: u64) -> io::Result<Option<Md5Digest>> {
    let (digest, read) = md5_stream(reader, cap.saturating_add(1))?;
    Ok((read <= cap).then_some(digest))
}

fn md5_stream<R: Read + ?Sized>(reader: &mut R, limit: u64) -> io::Result<(Md5Digest, u64)> {
    let mut hasher = Md5::new();
    let mut buf = vec![0u8; HASH_BUF_SIZE];
    let mut read: u64 = 0;
    while read < limit {
        let want = (limit - read).min(buf.len() as u64) as usize;
        let n = match reader.read(&mut buf[..want]) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        hasher.update(&buf[..n]);
        read += n as u64;
    }
    let mut out = [0u8; 16];
    out.copy_from_slice(&hasher.finalize());
    Ok((Md5Digest(out), read))
}

/// 规范化十六进制：大写、无分隔符
pub fn canonical_hex(bytes: &[u8]) -> String {
    hex::encode_upper(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_stream_digest() {
        let d = md5_reader(&mut io::empty()).unwrap();
        assert_eq!(d.to_string(), "D41D8CD98F00B204E9800998ECF8427E");
    }

    #[test]
    fn digest_spans_multiple_buffers() {
        // 跨越多个缓冲块，结果应与一次性计算一致
        let data = vec![b'a'; HASH_BUF_SIZE * 2 + 17];
        let streamed = md5_reader(&mut data.as_slice()).unwrap();
        assert_eq!(&streamed.0[..], &Md5::digest(&data)[..]);
    }

    #[test]
    fn capped_digest_stops_after_the_limit() {
        let data = vec![b'a'; 100];
        assert!(md5_reader_capped(&mut data.as_slice(), 99).unwrap().is_none());
        let exact = md5_reader_capped(&mut data.as_slice(), 100).unwrap().unwrap();
        assert_eq!(exact, md5_reader(&mut data.as_slice()).unwrap());
        // 超限时最多多读 1 字节
        let mut rest = data.as_slice();
        assert!(md5_reader_capped(&mut rest, 10).unwrap().is_none());
        assert_eq!(rest.len(), 89);
    }

    #[test]
    fn known_digest() {
        let d = md5_reader(&mut &b"The quick brown fox jumps over the lazy dog"[..]).unwrap();
        assert_eq!(canonical_hex(&d.0), "9E107D9D372BB6826BD81D3542A419D6");
    }
}
