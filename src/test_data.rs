#![cfg(test)]

use std::fs;
use std::path::Path;

macro_rules! post_body {
    () => {
"Moving a large codebase to *strict* mode took most of a year.

![cover](cover.png)

## Why

Implicit `any` hid a lot of bugs. A few of the things we found:

- nullable fields read without checks
- callbacks typed as `Function`

```mermaid
graph TD
  A[untyped] --> B[strict]
```

```rust
fn main() {
    println!(\"not everything was TypeScript\");
}
```
"
    };
}

pub const POST_BODY: &str = post_body!();

pub const POST_WITH_FRONTMATTER: &str = concat!(
"---
title: Learning TypeScript the hard way
date: 2024-01-15
tags: [typescript, react]
description: Notes from a long migration
author: Ana
cover: /images/cover.png
---
",
    post_body!()
);

/// Writes a minimal post with the given front-matter lines to `dir/slug.md`.
pub fn write_post(dir: &Path, slug: &str, frontmatter: &str, body: &str) {
    fs::create_dir_all(dir).unwrap();
    let text = format!("---\n{}\n---\n{}\n", frontmatter.trim(), body);
    fs::write(dir.join(format!("{}.md", slug)), text).unwrap();
}
