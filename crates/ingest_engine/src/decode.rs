use chardetng::EncodingDetector;
use encoding_rs::Encoding;

/// Guess the character encoding of a markup body: BOM first, then a chardetng
/// guess over the whole body.
pub fn detect_encoding(bytes: &[u8]) -> &'static Encoding {
    if let Some((encoding, _)) = Encoding::for_bom(bytes) {
        return encoding;
    }
    let mut detector = EncodingDetector::new();
    detector.feed(bytes, true);
    detector.guess(None, true)
}

#[cfg(test)]
mod tests {
    use super::detect_encoding;

    #[test]
    fn bom_wins() {
        assert_eq!(detect_encoding(b"\xEF\xBB\xBF<title>x</title>").name(), "UTF-8");
    }

    #[test]
    fn utf8_text_is_detected() {
        let body = "<title>Grüße aus Köln – übersicht</title>".as_bytes();
        assert_eq!(detect_encoding(body).name(), "UTF-8");
    }
}
