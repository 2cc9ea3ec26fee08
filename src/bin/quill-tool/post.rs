use std::fmt::Write;
use std::fs::{create_dir, File};
use std::path::PathBuf;

use anyhow::{bail, Result};
use chrono::{DateTime, Local};
use serde::Serialize;

use quill::text_utils::TIMESTAMP_FORMAT;
use quill::util::os_helper::author_or_current_user;

use crate::{PostArgs, PostOutput};

#[derive(Serialize)]
struct NewPostHeader<'a> {
    title: &'a str,
    date: String,
    author: &'a str,
    tags: Vec<String>,
    description: &'a str,
    draft: bool,
}

fn render_header(name: &str, date: &DateTime<Local>, title: Option<&str>) -> Result<String> {
    let header = NewPostHeader {
        title: title.unwrap_or("Replace with title"),
        date: date.format(TIMESTAMP_FORMAT).to_string(),
        author: name,
        tags: vec![],
        description: "",
        draft: true,
    };

    let mut buf = String::new();
    let _ = writeln!(&mut buf, "---");
    buf.push_str(&serde_yaml::to_string(&header)?);
    let _ = writeln!(&mut buf, "---");
    let _ = writeln!(&mut buf);
    Ok(buf)
}

fn render_body() -> String {
    let mut buf = String::new();

    let _ = writeln!(&mut buf, "This is a body example");
    let _ = writeln!(&mut buf, "Please remove it and replace with your content");
    let _ = writeln!(&mut buf);
    let _ = writeln!(&mut buf, "Images next to the post go in as ![[image.png|alt text]]");

    buf
}

fn post_slug_from_title(title: &str) -> String {
    let ascii = unidecode::unidecode(title).to_ascii_lowercase();
    let words: Vec<String> = ascii
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(|w| w.to_string())
        .collect();
    words.join("-")
}

fn write_post(path: &PathBuf, header: &str, body: &str) -> Result<()> {
    use std::io::Write;
    let mut file = File::create(path)?;
    file.write_all(header.as_bytes())?;
    file.write_all(body.as_bytes())?;
    Ok(())
}

pub fn post_cmd(args: PostArgs) -> Result<()> {
    let name = author_or_current_user(args.name.as_deref());
    let date = Local::now();

    let req_title = !matches!(args.output, PostOutput::Stdout);
    if req_title && args.title.is_none() {
        bail!("For file and dir outputs, title is required");
    }

    let header = render_header(&name, &date, args.title.as_deref())?;
    let body = render_body();
    let slug = post_slug_from_title(args.title.as_deref().unwrap_or_default());

    match args.output {
        PostOutput::Stdout => {
            print!("{}", header);
            print!("{}", body);
        }
        PostOutput::File => {
            let file_name = PathBuf::from(format!("{}.md", slug));
            println!("Creating file {}", file_name.display());
            write_post(&file_name, &header, &body)?;
        }
        PostOutput::Dir => {
            let full_path = PathBuf::from(&slug).join("index.md");
            println!("Creating dir post {}", full_path.display());
            create_dir(&slug)?;
            write_post(&full_path, &header, &body)?;
        }
    };

    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use quill::content::frontmatter;

    use super::*;

    #[test]
    fn test_header_is_valid_frontmatter() {
        let date = Local.with_ymd_and_hms(2024, 2, 27, 6, 20, 53).unwrap();
        let header = render_header("Ana: the \"author\"", &date, Some("Hello: world")).unwrap();
        let text = format!("{}{}", header, render_body());

        let doc = frontmatter::parse(&text);
        assert!(doc.metadata.draft);
        assert!(doc.metadata.tags.is_empty());
        assert_eq!(doc.metadata.author.as_deref(), Some("Ana: the \"author\""));

        let fm = doc.metadata.validate().unwrap();
        assert_eq!(fm.title, "Hello: world");
        assert_eq!(fm.date, "2024-02-27 06:20:53");
        assert!(doc.body.starts_with("\nThis is a body example"));
    }

    #[test]
    fn test_slug_from_title() {
        assert_eq!(post_slug_from_title("Post title of mine ábaco - dir2"), "post-title-of-mine-abaco-dir2");
        assert_eq!(post_slug_from_title("  Hello,   World!! "), "hello-world");
        assert_eq!(post_slug_from_title("Привет"), "privet");
    }
}
