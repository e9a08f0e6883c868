//! Execution dispatch: resolved target to finished foreground process.

use std::io;
use std::sync::Arc;

use crate::build::BuildError;
use crate::error::{ShellError, ShellResult};
use crate::expansion::Env;
use crate::process::{Process, ProcessRuntime, ProcessSpec, Program};
use crate::resolve::{Resolver, Target};
use crate::stdin::{Sink, StdinRoute, SwitchableWriter};

/// Points the stdin router at one child and puts it back on drop.
struct RouteGuard<'a> {
    router: &'a SwitchableWriter,
}

impl<'a> RouteGuard<'a> {
    fn attach(router: &'a SwitchableWriter, process: &mut dyn Process) -> Self {
        let pipe: Sink = process
            .take_stdin()
            .unwrap_or_else(|| Box::new(io::sink()));
        drop(router.switch(StdinRoute::Piped(process.id()), pipe));
        Self { router }
    }
}

impl Drop for RouteGuard<'_> {
    fn drop(&mut self) {
        // drops the child's pipe so it sees end of input
        drop(self.router.restore());
    }
}

pub struct Dispatcher {
    resolver: Resolver,
    runtime: Arc<dyn ProcessRuntime>,
    router: Arc<SwitchableWriter>,
}

impl Dispatcher {
    pub fn new(resolver: Resolver, runtime: Arc<dyn ProcessRuntime>, router: Arc<SwitchableWriter>) -> Self {
        Self {
            resolver,
            runtime,
            router,
        }
    }

    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    /// Resolve `name` and run it in the foreground.
    pub async fn execute(&self, name: &str, args: &[String], env: &Env, cwd: &str) -> ShellResult<()> {
        let program = match self.resolver.resolve(name, cwd).await? {
            Target::Binary(path) => Program::Module(path),
            Target::Script(path) => Program::Script(path),
            Target::BuildDir(path) => return Err(BuildError::NotBuilt { path }.into()),
            Target::NotFound(name) => return Err(ShellError::NotFound(name)),
        };

        let spec = ProcessSpec {
            program,
            args: args.to_vec(),
            env: env.clone(),
            cwd: cwd.to_string(),
        };
        self.run(&spec).await
    }

    /// Start `spec`, hand it the input stream until it exits.
    ///
    /// The route is back on the default buffer when this returns, whatever
    /// the outcome.
    pub async fn run(&self, spec: &ProcessSpec) -> ShellResult<()> {
        let mut process = self.runtime.start(spec).map_err(|source| ShellError::Start {
            name: spec.name().to_string(),
            source,
        })?;

        let status = {
            let _route = RouteGuard::attach(&self.router, process.as_mut());
            process.wait().await?
        };

        if status.success() {
            Ok(())
        } else {
            Err(ShellError::Runtime {
                name: spec.name().to_string(),
                status,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::Builder;
    use crate::process::ExitStatus;
    use crate::stdin::BlockingBuffer;
    use crate::vfs::{HostFs, Vfs};
    use async_trait::async_trait;
    use std::io::Write;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    const MODULE: &[u8] = b"\0asm\x01\0\0\0";

    #[derive(Clone, Default)]
    struct Capture(Arc<Mutex<Vec<u8>>>);

    impl Write for Capture {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    struct FailingBuilder;

    #[async_trait]
    impl Builder for FailingBuilder {
        async fn build(&self, source_dir: &str) -> Result<String, BuildError> {
            Err(BuildError::Failed {
                path: source_dir.to_string(),
                message: "syntax error".to_string(),
            })
        }
    }

    /// Runtime whose processes write one line into the router while running
    /// and record which route they observed.
    struct FakeRuntime {
        router: Arc<SwitchableWriter>,
        status: ExitStatus,
        fail_start: bool,
        started: AtomicUsize,
        stdin: Capture,
        seen_routes: Arc<Mutex<Vec<StdinRoute>>>,
        specs: Mutex<Vec<ProcessSpec>>,
    }

    impl FakeRuntime {
        fn new(router: Arc<SwitchableWriter>, status: ExitStatus, fail_start: bool) -> Self {
            Self {
                router,
                status,
                fail_start,
                started: AtomicUsize::new(0),
                stdin: Capture::default(),
                seen_routes: Arc::default(),
                specs: Mutex::default(),
            }
        }
    }

    struct FakeProcess {
        id: u32,
        router: Arc<SwitchableWriter>,
        status: ExitStatus,
        stdin: Option<Capture>,
        seen_routes: Arc<Mutex<Vec<StdinRoute>>>,
    }

    #[async_trait]
    impl Process for FakeProcess {
        fn id(&self) -> u32 {
            self.id
        }

        fn take_stdin(&mut self) -> Option<Sink> {
            self.stdin.take().map(|c| Box::new(c) as Sink)
        }

        async fn wait(&mut self) -> io::Result<ExitStatus> {
            self.seen_routes.lock().unwrap().push(self.router.route());
            self.router.write(b"for the child\n")?;
            Ok(self.status)
        }
    }

    impl ProcessRuntime for FakeRuntime {
        fn start(&self, spec: &ProcessSpec) -> io::Result<Box<dyn Process>> {
            self.specs.lock().unwrap().push(spec.clone());
            if self.fail_start {
                return Err(io::Error::new(io::ErrorKind::NotFound, "no runner"));
            }
            let id = 100 + u32::try_from(self.started.fetch_add(1, Ordering::SeqCst)).unwrap();
            Ok(Box::new(FakeProcess {
                id,
                router: self.router.clone(),
                status: self.status,
                stdin: Some(self.stdin.clone()),
                seen_routes: self.seen_routes.clone(),
            }))
        }
    }

    struct Fixture {
        _temp: tempfile::TempDir,
        vfs: Arc<HostFs>,
        router: Arc<SwitchableWriter>,
        runtime: Arc<FakeRuntime>,
        dispatcher: Dispatcher,
    }

    fn fixture(status: ExitStatus, fail_start: bool) -> Fixture {
        let temp = tempfile::tempdir().unwrap();
        let vfs = Arc::new(HostFs::open(temp.path()).unwrap());
        vfs.write("/sys/bin/tool.wasm", MODULE).unwrap();
        vfs.write("/cmd/broken/main.go", b"package main").unwrap();

        let router = Arc::new(SwitchableWriter::new(BlockingBuffer::new()));
        let runtime = Arc::new(FakeRuntime::new(router.clone(), status, fail_start));
        let resolver = Resolver::new(vfs.clone(), Arc::new(FailingBuilder));
        let dispatcher = Dispatcher::new(resolver, runtime.clone(), router.clone());
        Fixture {
            _temp: temp,
            vfs,
            router,
            runtime,
            dispatcher,
        }
    }

    fn args(words: &[&str]) -> Vec<String> {
        words.iter().map(|w| (*w).to_string()).collect()
    }

    #[tokio::test]
    async fn child_owns_stdin_while_running() {
        let fx = fixture(ExitStatus::Code(0), false);
        fx.router.write(b"typed early\n").unwrap();

        let env = Env::from([("HOME".to_string(), "/root".to_string())]);
        fx.dispatcher
            .execute("tool", &args(&["-v", "x"]), &env, "/")
            .await
            .unwrap();

        assert_eq!(*fx.runtime.seen_routes.lock().unwrap(), vec![StdinRoute::Piped(100)]);
        assert_eq!(*fx.runtime.stdin.0.lock().unwrap(), b"for the child\n");
        assert_eq!(fx.router.default_buffer().take_available(), b"typed early\n");
        assert_eq!(fx.router.route(), StdinRoute::Buffered);

        let specs = fx.runtime.specs.lock().unwrap();
        assert_eq!(specs[0].program, Program::Module("/sys/bin/tool.wasm".to_string()));
        assert_eq!(specs[0].args, vec!["-v", "x"]);
        assert_eq!(specs[0].env["HOME"], "/root");
    }

    #[tokio::test]
    async fn route_restored_after_repeated_cycles() {
        let fx = fixture(ExitStatus::Code(0), false);
        for _ in 0..3 {
            fx.dispatcher.execute("tool", &[], &Env::new(), "/").await.unwrap();
            assert_eq!(fx.router.route(), StdinRoute::Buffered);
        }
        assert_eq!(
            *fx.runtime.seen_routes.lock().unwrap(),
            vec![StdinRoute::Piped(100), StdinRoute::Piped(101), StdinRoute::Piped(102)]
        );
    }

    #[tokio::test]
    async fn runtime_failure_restores_route() {
        let fx = fixture(ExitStatus::Code(3), false);

        let err = fx.dispatcher.execute("tool", &[], &Env::new(), "/").await.unwrap_err();

        assert!(matches!(err, ShellError::Runtime { status: ExitStatus::Code(3), .. }));
        assert_eq!(err.to_string(), "/sys/bin/tool.wasm: exit status 3");
        assert_eq!(fx.router.route(), StdinRoute::Buffered);
    }

    #[tokio::test]
    async fn start_failure_never_switches() {
        let fx = fixture(ExitStatus::Code(0), true);

        let err = fx.dispatcher.execute("tool", &[], &Env::new(), "/").await.unwrap_err();

        assert!(matches!(err, ShellError::Start { .. }));
        assert!(fx.runtime.seen_routes.lock().unwrap().is_empty());
        assert_eq!(fx.router.route(), StdinRoute::Buffered);
    }

    #[tokio::test]
    async fn build_failure_starts_nothing() {
        let fx = fixture(ExitStatus::Code(0), false);

        let err = fx.dispatcher.execute("broken", &[], &Env::new(), "/").await.unwrap_err();

        assert!(matches!(err, ShellError::Build(BuildError::Failed { .. })));
        assert!(fx.runtime.specs.lock().unwrap().is_empty());
        assert_eq!(fx.router.route(), StdinRoute::Buffered);
    }

    #[tokio::test]
    async fn unknown_command_is_not_found() {
        let fx = fixture(ExitStatus::Code(0), false);

        let err = fx.dispatcher.execute("nope", &[], &Env::new(), "/").await.unwrap_err();

        assert_eq!(err.to_string(), "unable to find command: nope");
        assert!(fx.runtime.specs.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn scripts_dispatch_as_script_programs() {
        let fx = fixture(ExitStatus::Code(0), false);
        fx.vfs.write("/cmd/hello.sh", b"echo hello").unwrap();

        fx.dispatcher.execute("hello", &[], &Env::new(), "/home").await.unwrap();

        let specs = fx.runtime.specs.lock().unwrap();
        assert_eq!(specs[0].program, Program::Script("/cmd/hello.sh".to_string()));
        assert_eq!(specs[0].cwd, "/home");
    }
}
