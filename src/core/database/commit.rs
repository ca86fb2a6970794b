use super::{author::Author, database::GitObject};
use crate::errors::error::Error;
use std::any::Any;
use std::str;

/// A commit object: a tree plus any number of parents. Merge commits carry
/// two parents; virtual commits built during recursive merging carry the two
/// partial bases they were folded from.
#[derive(Debug, Clone)]
pub struct Commit {
    pub oid: Option<String>,
    pub parents: Vec<String>,
    pub tree: String,
    pub author: Author,
    pub committer: Author,
    pub message: String,
}

impl GitObject for Commit {
    fn get_type(&self) -> &str {
        "commit"
    }

    fn to_bytes(&self) -> Vec<u8> {
        let mut lines = Vec::with_capacity(5 + self.parents.len());

        lines.push(format!("tree {}", self.tree));
        for parent in &self.parents {
            lines.push(format!("parent {}", parent));
        }
        lines.push(format!("author {}", self.author));
        lines.push(format!("committer {}", self.committer));
        lines.push(String::new());
        lines.push(self.message.clone());

        lines.join("\n").into_bytes()
    }

    fn set_oid(&mut self, oid: String) {
        self.oid = Some(oid);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn clone_box(&self) -> Box<dyn GitObject> {
        Box::new(self.clone())
    }
}

impl Commit {
    pub fn new(parents: Vec<String>, tree: String, author: Author, message: String) -> Self {
        Commit {
            oid: None,
            parents,
            tree,
            author: author.clone(),
            committer: author,
            message,
        }
    }

    pub fn title_line(&self) -> String {
        self.message.lines().next().unwrap_or("").to_string()
    }

    pub fn get_parents(&self) -> &[String] {
        &self.parents
    }

    pub fn get_oid(&self) -> Option<&String> {
        self.oid.as_ref()
    }

    pub fn get_tree(&self) -> &str {
        &self.tree
    }

    pub fn parse(data: &[u8]) -> Result<Self, Error> {
        let content = str::from_utf8(data)
            .map_err(|_| Error::InvalidObject("Invalid UTF-8 in commit".to_string()))?;

        let mut tree = None;
        let mut parents = Vec::new();
        let mut author = None;
        let mut committer = None;
        let mut message = String::new();
        let mut reading_message = false;

        for line in content.lines() {
            if reading_message {
                if !message.is_empty() {
                    message.push('\n');
                }
                message.push_str(line);
                continue;
            }
            if line.is_empty() {
                reading_message = true;
                continue;
            }

            let parts: Vec<&str> = line.splitn(2, ' ').collect();
            if parts.len() != 2 {
                return Err(Error::InvalidObject(format!(
                    "Invalid commit header: {}",
                    line
                )));
            }

            match parts[0] {
                "tree" => tree = Some(parts[1].to_string()),
                "parent" => parents.push(parts[1].to_string()),
                "author" => author = Some(parts[1].to_string()),
                "committer" => committer = Some(parts[1].to_string()),
                _ => {}
            }
        }

        let tree =
            tree.ok_or_else(|| Error::InvalidObject("Missing tree in commit".to_string()))?;

        let author_str =
            author.ok_or_else(|| Error::InvalidObject("Missing author in commit".to_string()))?;
        let author = Author::parse(&author_str).map_err(Error::InvalidObject)?;

        let committer = match committer {
            Some(s) => Author::parse(&s).unwrap_or_else(|_| author.clone()),
            None => author.clone(),
        };

        Ok(Commit {
            oid: None,
            parents,
            tree,
            author,
            committer,
            message,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_keeps_parent_order() {
        let raw = b"tree 4b825dc642cb6eb9a060e54bf8d69288fbee4904\n\
parent 1111111111111111111111111111111111111111\n\
parent 2222222222222222222222222222222222222222\n\
author A U Thor <a@example.com> 1700000000 +0000\n\
committer A U Thor <a@example.com> 1700000000 +0000\n\
\n\
merge";
        let commit = Commit::parse(raw).unwrap();
        assert_eq!(
            commit.get_parents(),
            &[
                "1111111111111111111111111111111111111111".to_string(),
                "2222222222222222222222222222222222222222".to_string(),
            ]
        );
        assert_eq!(commit.title_line(), "merge");
    }

    #[test]
    fn serialization_round_trips() {
        let author = Author::parse("A U Thor <a@example.com> 1700000000 +0000").unwrap();
        let commit = Commit::new(
            vec!["1111111111111111111111111111111111111111".to_string()],
            "4b825dc642cb6eb9a060e54bf8d69288fbee4904".to_string(),
            author,
            "subject\n\nbody".to_string(),
        );
        let reparsed = Commit::parse(&commit.to_bytes()).unwrap();
        assert_eq!(reparsed.get_tree(), commit.get_tree());
        assert_eq!(reparsed.get_parents(), commit.get_parents());
        assert_eq!(reparsed.message, commit.message);
    }
}
