use std::io::Write;

use super::{split_flags, usage};
use crate::error::ShellResult;
use crate::shell::Shell;
use crate::vfs::{FileInfo, VfsError};

impl Shell {
    pub(super) fn dispatch_fs_builtin(&mut self, name: &str, args: &[String]) -> ShellResult<()> {
        match name {
            "pwd" => self.cmd_pwd(),
            "cd" => self.cmd_cd(args),
            "ls" => self.cmd_ls(args),
            "cat" => self.cmd_cat(args),
            "touch" => self.cmd_touch(args),
            "mkdir" => self.cmd_mkdir(args),
            "rm" => self.cmd_rm(args),
            "mv" => self.cmd_mv(args),
            "cp" => self.cmd_cp(args),
            "write" => self.cmd_write(args),
            "mtime" => self.cmd_mtime(args),
            "tree" => self.cmd_tree(args),
            _ => unreachable!(),
        }
    }

    fn cmd_pwd(&mut self) -> ShellResult<()> {
        let cwd = self.cwd.clone();
        self.writeln(&cwd)
    }

    fn cmd_cd(&mut self, args: &[String]) -> ShellResult<()> {
        let path = args.first().map_or("/", String::as_str);
        let target = self.resolve_path(path);
        if !self.vfs.stat(&target)?.is_dir {
            return Err(VfsError::NotADirectory(target).into());
        }
        self.cwd = target;
        Ok(())
    }

    fn cmd_ls(&mut self, args: &[String]) -> ShellResult<()> {
        let (flags, operands) = split_flags(args);
        let long_format = flags.iter().any(|f| f.contains('l'));
        let paths = if operands.is_empty() { vec!["."] } else { operands };
        let show_headers = paths.len() > 1;

        for (i, path) in paths.iter().enumerate() {
            let full_path = self.resolve_path(path);
            let info = self.vfs.stat(&full_path)?;
            let entries = if info.is_dir {
                self.vfs.readdir(&full_path)?
            } else {
                vec![info]
            };

            if show_headers {
                if i > 0 {
                    self.writeln("")?;
                }
                self.writeln(&format!("{path}:"))?;
            }
            for entry in &entries {
                let line = if long_format {
                    format_long_entry(entry)
                } else {
                    display_name(entry)
                };
                self.writeln(&line)?;
            }
        }
        Ok(())
    }

    fn cmd_cat(&mut self, args: &[String]) -> ShellResult<()> {
        if args.is_empty() {
            return Err(usage("cat"));
        }
        for path in args {
            let data = self.vfs.read(&self.resolve_path(path))?;
            self.stdout.write_all(&data)?;
        }
        Ok(())
    }

    fn cmd_touch(&mut self, args: &[String]) -> ShellResult<()> {
        if args.is_empty() {
            return Err(usage("touch"));
        }
        for path in args {
            self.vfs.touch(&self.resolve_path(path))?;
        }
        Ok(())
    }

    fn cmd_mkdir(&mut self, args: &[String]) -> ShellResult<()> {
        let (flags, operands) = split_flags(args);
        if operands.is_empty() {
            return Err(usage("mkdir"));
        }
        let parents = flags.contains(&"-p");
        for path in operands {
            self.vfs.mkdir(&self.resolve_path(path), parents)?;
        }
        Ok(())
    }

    fn cmd_rm(&mut self, args: &[String]) -> ShellResult<()> {
        let (flags, operands) = split_flags(args);
        if operands.is_empty() {
            return Err(usage("rm"));
        }
        let recursive = flags.iter().any(|f| f.contains('r') || f.contains('R'));
        for path in operands {
            self.vfs.remove(&self.resolve_path(path), recursive)?;
        }
        Ok(())
    }

    fn cmd_mv(&mut self, args: &[String]) -> ShellResult<()> {
        let [from, to] = args else {
            return Err(usage("mv"));
        };
        self.vfs.rename(&self.resolve_path(from), &self.resolve_path(to))?;
        Ok(())
    }

    fn cmd_cp(&mut self, args: &[String]) -> ShellResult<()> {
        let [from, to] = args else {
            return Err(usage("cp"));
        };
        self.vfs.copy(&self.resolve_path(from), &self.resolve_path(to))?;
        Ok(())
    }

    fn cmd_write(&mut self, args: &[String]) -> ShellResult<()> {
        let Some((path, words)) = args.split_first() else {
            return Err(usage("write"));
        };
        let mut text = words.join(" ");
        text.push('\n');
        self.vfs.write(&self.resolve_path(path), text.as_bytes())?;
        Ok(())
    }

    fn cmd_mtime(&mut self, args: &[String]) -> ShellResult<()> {
        let [path] = args else {
            return Err(usage("mtime"));
        };
        let info = self.vfs.stat(&self.resolve_path(path))?;
        self.writeln(&info.mtime.to_string())
    }

    fn cmd_tree(&mut self, args: &[String]) -> ShellResult<()> {
        let path = args.first().map_or(".", String::as_str);
        let full_path = self.resolve_path(path);
        if !self.vfs.is_dir(&full_path) {
            // stat gives the precise error for a missing path
            self.vfs.stat(&full_path)?;
            return Err(VfsError::NotADirectory(full_path).into());
        }

        self.writeln(&full_path)?;
        let (dirs, files) = self.print_tree(&full_path, "")?;
        self.writeln(&format!("\n{dirs} directories, {files} files"))
    }

    fn print_tree(&mut self, path: &str, prefix: &str) -> ShellResult<(usize, usize)> {
        let entries = self.vfs.readdir(path)?;
        let (mut dirs, mut files) = (0, 0);

        for (i, entry) in entries.iter().enumerate() {
            let is_last = i + 1 == entries.len();
            let connector = if is_last { "└── " } else { "├── " };
            self.writeln(&format!("{prefix}{connector}{}", display_name(entry)))?;

            if entry.is_dir {
                dirs += 1;
                let child_prefix = format!("{prefix}{}", if is_last { "    " } else { "│   " });
                let (d, f) = self.print_tree(&entry.path, &child_prefix)?;
                dirs += d;
                files += f;
            } else {
                files += 1;
            }
        }
        Ok((dirs, files))
    }
}

fn display_name(entry: &FileInfo) -> String {
    if entry.is_dir {
        format!("{}/", entry.name)
    } else {
        entry.name.clone()
    }
}

fn format_long_entry(entry: &FileInfo) -> String {
    let type_char = if entry.is_dir { 'd' } else { '-' };
    format!(
        "{type_char} {:>8} {} {}",
        entry.size,
        format_mtime(entry.mtime),
        display_name(entry)
    )
}

/// `Mon DD HH:MM` in UTC.
pub(crate) fn format_mtime(mtime: u64) -> String {
    const MONTHS: [&str; 12] = [
        "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
    ];
    let is_leap = |y: u64| (y % 4 == 0 && y % 100 != 0) || y % 400 == 0;

    let mut days = mtime / 86400;
    let time_of_day = mtime % 86400;
    let hours = time_of_day / 3600;
    let minutes = (time_of_day % 3600) / 60;

    let mut year = 1970;
    loop {
        let days_in_year = if is_leap(year) { 366 } else { 365 };
        if days < days_in_year {
            break;
        }
        days -= days_in_year;
        year += 1;
    }

    let month_days = [31, if is_leap(year) { 29 } else { 28 }, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31];
    let mut month = 0;
    while month < 11 && days >= month_days[month] {
        days -= month_days[month];
        month += 1;
    }

    format!("{} {:>2} {hours:02}:{minutes:02}", MONTHS[month], days + 1)
}
