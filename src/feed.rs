use std::io::Cursor;

use chrono::{DateTime, TimeZone, Utc};
use quick_xml::events::{BytesCData, BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

use crate::config::Site;
use crate::content::Post;

/* Example
<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:atom="http://www.w3.org/2005/Atom">
<channel>
  <title>Notes</title>
  <link>https://blog.example.com</link>
  <description>Things I wrote down</description>
  <language>en-US</language>
  <lastBuildDate>Mon, 1 Apr 2024 10:00:00 +0000</lastBuildDate>
  <atom:link href="https://blog.example.com/feed.xml" rel="self" type="application/rss+xml"/>
  <item>
    <title><![CDATA[Learning TypeScript the hard way]]></title>
    <link>https://blog.example.com/learning-ts</link>
    <guid isPermaLink="true">https://blog.example.com/learning-ts</guid>
    <pubDate>Mon, 15 Jan 2024 00:00:00 +0000</pubDate>
    <description><![CDATA[Moving a large codebase...]]></description>
    <author>ana@example.com (Ana)</author>
    <category>typescript</category>
  </item>
</channel>
</rss>
*/

pub const FEED_PATH: &str = "feed.xml";

pub struct RssChannel<'a> {
    pub title: &'a str,
    pub link: &'a str,
    pub description: &'a str,
    pub language: &'a str,
    pub author_name: &'a str,
    pub author_email: &'a str,
}

impl<'a> RssChannel<'a> {
    pub fn from_site(site: &'a Site) -> RssChannel<'a> {
        RssChannel {
            title: &site.title,
            link: site.link.trim_end_matches('/'),
            description: &site.description,
            language: &site.lang,
            author_name: &site.author_name,
            author_email: &site.author_email,
        }
    }

    fn author(&self) -> Option<String> {
        match (self.author_email.is_empty(), self.author_name.is_empty()) {
            (true, true) => None,
            (false, true) => Some(self.author_email.to_string()),
            (true, false) => Some(self.author_name.to_string()),
            (false, false) => Some(format!("{} ({})", self.author_email, self.author_name)),
        }
    }

    pub fn render(&self, posts: &[Post], build_date: DateTime<Utc>) -> quick_xml::Result<Vec<u8>> {
        let mut writer = Writer::new(Cursor::new(Vec::new()));

        writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

        let mut rss = BytesStart::new("rss");
        rss.push_attribute(("version", "2.0"));
        rss.push_attribute(("xmlns:atom", "http://www.w3.org/2005/Atom"));
        writer.write_event(Event::Start(rss))?;
        writer.write_event(Event::Start(BytesStart::new("channel")))?;

        push_text(&mut writer, "title", self.title)?;
        push_text(&mut writer, "link", self.link)?;
        push_text(&mut writer, "description", self.description)?;
        push_text(&mut writer, "language", self.language)?;
        push_text(&mut writer, "lastBuildDate", &build_date.to_rfc2822())?;

        let self_link = format!("{}/{}", self.link, FEED_PATH);
        let mut atom_link = BytesStart::new("atom:link");
        atom_link.push_attribute(("href", self_link.as_str()));
        atom_link.push_attribute(("rel", "self"));
        atom_link.push_attribute(("type", "application/rss+xml"));
        writer.write_event(Event::Empty(atom_link))?;

        let author = self.author();
        for post in posts {
            writer.write_event(Event::Start(BytesStart::new("item")))?;

            push_cdata(&mut writer, "title", &post.frontmatter.title)?;

            let url = format!("{}/{}", self.link, post.slug);
            push_text(&mut writer, "link", &url)?;

            let mut guid = BytesStart::new("guid");
            guid.push_attribute(("isPermaLink", "true"));
            writer.write_event(Event::Start(guid))?;
            writer.write_event(Event::Text(BytesText::new(&url)))?;
            writer.write_event(Event::End(BytesEnd::new("guid")))?;

            // Undated posts have no pubDate rather than a made up one
            if let Some(date) = post.sort_key() {
                push_text(&mut writer, "pubDate", &Utc.from_utc_datetime(&date).to_rfc2822())?;
            }

            push_cdata(&mut writer, "description", &post.excerpt)?;

            if let Some(ref author) = author {
                push_text(&mut writer, "author", author)?;
            }

            for tag in post.frontmatter.tags.iter() {
                push_text(&mut writer, "category", tag)?;
            }

            writer.write_event(Event::End(BytesEnd::new("item")))?;
        }

        writer.write_event(Event::End(BytesEnd::new("channel")))?;
        writer.write_event(Event::End(BytesEnd::new("rss")))?;

        Ok(writer.into_inner().into_inner())
    }
}

fn push_text(writer: &mut Writer<Cursor<Vec<u8>>>, tag: &str, text: &str) -> quick_xml::Result<()> {
    writer.write_event(Event::Start(BytesStart::new(tag)))?;
    writer.write_event(Event::Text(BytesText::new(text)))?;
    writer.write_event(Event::End(BytesEnd::new(tag)))?;
    Ok(())
}

fn push_cdata(writer: &mut Writer<Cursor<Vec<u8>>>, tag: &str, text: &str) -> quick_xml::Result<()> {
    writer.write_event(Event::Start(BytesStart::new(tag)))?;
    if text.contains("]]>") {
        let new_text = text.replace("]]>", "]] >");
        writer.write_event(Event::CData(BytesCData::new(&new_text)))?;
    } else {
        writer.write_event(Event::CData(BytesCData::new(text)))?;
    }
    writer.write_event(Event::End(BytesEnd::new(tag)))?;
    Ok(())
}
