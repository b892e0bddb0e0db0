use rand::RngCore;

/// Minimal `multipart/form-data` encoder for the bot upload call.
pub struct MultipartForm {
    boundary: String,
    body: Vec<u8>,
}

impl MultipartForm {
    /// New form with a random boundary.
    pub fn new() -> Self {
        let mut bytes = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self::with_boundary(format!("----helmetwatch{}", hex::encode(bytes)))
    }

    pub fn with_boundary(boundary: impl Into<String>) -> Self {
        Self {
            boundary: boundary.into(),
            body: Vec::new(),
        }
    }

    pub fn text(mut self, name: &str, value: &str) -> Self {
        self.open_part();
        self.body.extend_from_slice(
            format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name).as_bytes(),
        );
        self.body.extend_from_slice(value.as_bytes());
        self.body.extend_from_slice(b"\r\n");
        self
    }

    pub fn file(mut self, name: &str, filename: &str, content_type: &str, data: &[u8]) -> Self {
        self.open_part();
        self.body.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                name, filename, content_type
            )
            .as_bytes(),
        );
        self.body.extend_from_slice(data);
        self.body.extend_from_slice(b"\r\n");
        self
    }

    /// `Content-Type` header value for this form.
    pub fn content_type(&self) -> String {
        format!("multipart/form-data; boundary={}", self.boundary)
    }

    /// Close the form and return the encoded body.
    pub fn finish(mut self) -> Vec<u8> {
        self.body
            .extend_from_slice(format!("--{}--\r\n", self.boundary).as_bytes());
        self.body
    }

    fn open_part(&mut self) {
        self.body
            .extend_from_slice(format!("--{}\r\n", self.boundary).as_bytes());
    }
}

impl Default for MultipartForm {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_text_and_file_parts() {
        let form = MultipartForm::with_boundary("XYZ")
            .text("chat_id", "42")
            .file("photo", "detected.png", "image/png", b"\x89PNG");
        assert_eq!(form.content_type(), "multipart/form-data; boundary=XYZ");
        let body = form.finish();
        let expected: &[u8] = b"--XYZ\r\n\
Content-Disposition: form-data; name=\"chat_id\"\r\n\r\n42\r\n\
--XYZ\r\n\
Content-Disposition: form-data; name=\"photo\"; filename=\"detected.png\"\r\n\
Content-Type: image/png\r\n\r\n\x89PNG\r\n\
--XYZ--\r\n";
        assert_eq!(body, expected);
    }

    #[test]
    fn random_boundaries_differ() {
        assert_ne!(
            MultipartForm::new().content_type(),
            MultipartForm::new().content_type()
        );
    }
}
