pub struct CommandHelp {
    pub name: &'static str,
    pub summary: &'static str,
    pub usage: &'static str,
    pub options: &'static [(&'static str, &'static str)],
}

pub const COMMANDS: &[CommandHelp] = &[
    CommandHelp {
        name: "cat",
        summary: "Print file contents",
        usage: "cat FILE...",
        options: &[],
    },
    CommandHelp {
        name: "cd",
        summary: "Change the current directory",
        usage: "cd [DIR]",
        options: &[],
    },
    CommandHelp {
        name: "cp",
        summary: "Copy a file or directory tree",
        usage: "cp SOURCE DEST",
        options: &[],
    },
    CommandHelp {
        name: "echo",
        summary: "Display a line of text",
        usage: "echo [STRING]...",
        options: &[],
    },
    CommandHelp {
        name: "env",
        summary: "Display environment variables",
        usage: "env [NAME]",
        options: &[],
    },
    CommandHelp {
        name: "exit",
        summary: "Exit the shell",
        usage: "exit [CODE]",
        options: &[],
    },
    CommandHelp {
        name: "export",
        summary: "Set shell environment variables",
        usage: "export NAME=VALUE...",
        options: &[],
    },
    CommandHelp {
        name: "help",
        summary: "Show help for built-in commands",
        usage: "help [COMMAND]",
        options: &[],
    },
    CommandHelp {
        name: "ls",
        summary: "List directory contents",
        usage: "ls [-l] [PATH]...",
        options: &[("-l", "Long format with size and modification time")],
    },
    CommandHelp {
        name: "mkdir",
        summary: "Create directories",
        usage: "mkdir [-p] DIR...",
        options: &[("-p", "Create parent directories as needed")],
    },
    CommandHelp {
        name: "mtime",
        summary: "Print modification time in seconds since the epoch",
        usage: "mtime PATH",
        options: &[],
    },
    CommandHelp {
        name: "mv",
        summary: "Move or rename a file or directory",
        usage: "mv SOURCE DEST",
        options: &[],
    },
    CommandHelp {
        name: "printenv",
        summary: "Display environment variables",
        usage: "printenv [NAME]",
        options: &[],
    },
    CommandHelp {
        name: "pwd",
        summary: "Print the current directory",
        usage: "pwd",
        options: &[],
    },
    CommandHelp {
        name: "rm",
        summary: "Remove files or directories",
        usage: "rm [-r] PATH...",
        options: &[("-r", "Remove directories and their contents")],
    },
    CommandHelp {
        name: "touch",
        summary: "Create files or update their modification time",
        usage: "touch FILE...",
        options: &[],
    },
    CommandHelp {
        name: "tree",
        summary: "Display a directory tree",
        usage: "tree [PATH]",
        options: &[],
    },
    CommandHelp {
        name: "which",
        summary: "Show how a command name resolves",
        usage: "which NAME...",
        options: &[],
    },
    CommandHelp {
        name: "write",
        summary: "Write text to a file, replacing its contents",
        usage: "write FILE TEXT...",
        options: &[],
    },
];

pub fn get_help(name: &str) -> Option<&'static CommandHelp> {
    COMMANDS.iter().find(|c| c.name == name)
}

pub fn format_help(cmd: &CommandHelp) -> String {
    let mut out = format!("{} - {}\n\nUsage: {}\n", cmd.name, cmd.summary, cmd.usage);
    if !cmd.options.is_empty() {
        out.push_str("\nOptions:\n");
        for (opt, desc) in cmd.options {
            out.push_str(&format!("  {opt:16} {desc}\n"));
        }
    }
    out
}

pub fn format_help_list() -> String {
    let mut out = String::from("vsh - built-in commands\n\n");
    for cmd in COMMANDS {
        out.push_str(&format!("  {:12} {}\n", cmd.name, cmd.summary));
    }
    out.push_str(
        "\nAny other name runs a program from /cmd, /sys/cmd or /sys/bin.\n\
         Use 'help COMMAND' for more information.\n",
    );
    out
}
