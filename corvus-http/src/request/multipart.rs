//! `multipart/form-data` encoding for requests with file attachments
//! : a `payload_json` part carrying the JSON body, followed by
//! `file` (single attachment) or `files[N]` (multiple) parts.
//!
//! The teacher pulls in `common_multipart_rfc7578` for this; that crate
//! only gives a boundary generator and a generic part list, not the
//! `payload_json`/`file[N]` naming convention the API requires, so this
//! encodes the parts directly instead.

use rand::Rng;

pub struct Attachment {
    pub filename: String,
    pub content: Vec<u8>,
}

pub struct Form {
    boundary: String,
    payload_json: Vec<u8>,
    files: Vec<Attachment>,
}

impl Form {
    #[must_use]
    pub fn new(payload_json: Vec<u8>, files: Vec<Attachment>) -> Self {
        Self {
            boundary: generate_boundary(),
            payload_json,
            files,
        }
    }

    pub fn content_type(&self) -> String {
        format!("multipart/form-data; boundary={}", self.boundary)
    }

    #[must_use]
    pub fn build(self) -> Vec<u8> {
        let mut body = Vec::new();

        write_field(&mut body, &self.boundary, "payload_json", &self.payload_json);

        if self.files.len() == 1 {
            let file = &self.files[0];
            write_file(&mut body, &self.boundary, "file", &file.filename, &file.content);
        } else {
            for (index, file) in self.files.iter().enumerate() {
                let name = format!("files[{index}]");
                write_file(&mut body, &self.boundary, &name, &file.filename, &file.content);
            }
        }

        body.extend_from_slice(format!("--{}--\r\n", self.boundary).as_bytes());

        body
    }
}

fn write_field(body: &mut Vec<u8>, boundary: &str, name: &str, value: &[u8]) {
    body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
    body.extend_from_slice(
        format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
    );
    body.extend_from_slice(value);
    body.extend_from_slice(b"\r\n");
}

fn write_file(body: &mut Vec<u8>, boundary: &str, name: &str, filename: &str, content: &[u8]) {
    body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\n\
             Content-Type: application/octet-stream\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(content);
    body.extend_from_slice(b"\r\n");
}

fn generate_boundary() -> String {
    const CHARS: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";
    let mut rng = rand::thread_rng();

    (0..24)
        .map(|_| CHARS[rng.gen_range(0..CHARS.len())] as char)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_file_uses_bare_file_field_name() {
        let form = Form::new(
            br#"{"content":"hi"}"#.to_vec(),
            vec![Attachment {
                filename: "a.png".to_owned(),
                content: vec![1, 2, 3],
            }],
        );
        let body = String::from_utf8_lossy(&form.build()).into_owned();

        assert!(body.contains("name=\"payload_json\""));
        assert!(body.contains("name=\"file\"; filename=\"a.png\""));
        assert!(!body.contains("files[0]"));
    }

    #[test]
    fn multiple_files_are_indexed() {
        let form = Form::new(
            br#"{}"#.to_vec(),
            vec![
                Attachment {
                    filename: "a.png".to_owned(),
                    content: vec![1],
                },
                Attachment {
                    filename: "b.png".to_owned(),
                    content: vec![2],
                },
            ],
        );
        let body = String::from_utf8_lossy(&form.build()).into_owned();

        assert!(body.contains("name=\"files[0]\"; filename=\"a.png\""));
        assert!(body.contains("name=\"files[1]\"; filename=\"b.png\""));
    }
}
