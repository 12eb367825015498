/* MAIN.rs
 *   by Lut99
 *
 * Created:
 *   17 Sep 2022, 10:34:16
 * Last edited:
 *   14 Jan 2023, 21:26:40
 * Auto updated?
 *   Yes
 *
 * Description:
 *   Entrypoint to the game executable.
**/

use std::cell::RefCell;
use std::fs::File;
use std::rc::Rc;
use std::str::FromStr;
use std::time::Instant;

use log::{error, info, LevelFilter};
use semver::Version;
use simplelog::{ColorChoice, CombinedLogger, TerminalMode, TermLogger, WriteLogger};
use winit::dpi::PhysicalSize;
use winit::event::{Event, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop};
use winit::window::{Fullscreen, WindowBuilder};

use sail_cfg::{Config, WindowMode};
use sail_ecs::{System, SystemDescriptor, World};
use sail_gfx::{RenderSystem, RENDER_SYSTEM_ID};
use sail_pip::{RenderPipelineSystem, RENDER_PIPELINE_SYSTEM_ID};
use sail_tgt::{RenderTargetSystem, RENDER_TARGET_SYSTEM_ID};
use sail_thr::RenderThread;
use sail_utl::traits::AsAny;


/***** ENTRYPOINT *****/
fn main() {
    // Load the config
    let config = match Config::new() {
        Ok(config) => config,
        Err(err)   => { eprintln!("Could not load configuration: {}", err); std::process::exit(1); }
    };

    // Initialize the logger
    if let Err(err) = CombinedLogger::init(vec![
         TermLogger::new(config.verbosity, Default::default(), TerminalMode::Mixed, ColorChoice::Auto),
         WriteLogger::new(LevelFilter::Debug, Default::default(), File::create(&config.files.log).unwrap_or_else(|err| panic!("Could not open log file '{}': {}", config.files.log.display(), err))),
    ]) {
        eprintln!("Could not initialize loggers: {}", err);
        std::process::exit(1);
    }

    info!("Initializing Sail-Rust {}", env!("CARGO_PKG_VERSION"));

    // Initialize the event loop and the window
    let event_loop = EventLoop::new();
    let (width, height): (u32, u32) = (&config.resolution).into();
    let window = match WindowBuilder::new()
        .with_title(format!("Sail-Rust v{}", env!("CARGO_PKG_VERSION")))
        .with_inner_size(PhysicalSize::new(width, height))
        .with_fullscreen(match config.window_mode {
            WindowMode::Windowed => None,
            // Exclusive fullscreen needs a picked video mode; borderless covers both for now
            WindowMode::WindowedFullscreen | WindowMode::Fullscreen => Some(Fullscreen::Borderless(None)),
        })
        .build(&event_loop)
    {
        Ok(window) => window,
        Err(err)   => { error!("Could not create window: {}", err); std::process::exit(1); }
    };

    // Initialize the render thread (device objects only; the loop starts after the systems exist)
    let version = Version::from_str(env!("CARGO_PKG_VERSION")).unwrap_or_else(|err| panic!("Could not parse environment variable CARGO_PKG_VERSION ('{}') as Version: {}", env!("CARGO_PKG_VERSION"), err));
    let debug = config.verbosity >= LevelFilter::Debug;
    let render_thread = match RenderThread::new(&window, "Sail-Rust", version, Some(config.gpu), debug) {
        Ok(thread) => thread,
        Err(err)   => { error!("Could not initialize render thread: {}", err); std::process::exit(1); }
    };

    // Initialize the world and its systems, dependencies first (registration order is tick order)
    let mut world = World::new();

    let render_system = match RenderSystem::new(render_thread.clone()) {
        Ok(system) => Rc::new(RefCell::new(system)),
        Err(err)   => { error!("Could not initialize render system: {}", err); std::process::exit(1); }
    };
    world.register(
        SystemDescriptor{ id: RENDER_SYSTEM_ID, name: "Render", deps: vec![] },
        render_system.clone(),
    ).unwrap_or_else(|err| panic!("Could not register render system: {}", err));

    let target_system = match RenderTargetSystem::new(render_system.clone(), render_thread.clone()) {
        Ok(system) => Rc::new(RefCell::new(system)),
        Err(err)   => { error!("Could not initialize render target system: {}", err); std::process::exit(1); }
    };
    world.register(
        SystemDescriptor{ id: RENDER_TARGET_SYSTEM_ID, name: "Render Target", deps: vec![ RENDER_SYSTEM_ID ] },
        target_system.clone(),
    ).unwrap_or_else(|err| panic!("Could not register render target system: {}", err));

    let pipeline_system = match RenderPipelineSystem::new(render_system.clone(), target_system.clone(), render_thread.clone()) {
        Ok(system) => Rc::new(RefCell::new(system)),
        Err(err)   => { error!("Could not initialize render pipeline system: {}", err); std::process::exit(1); }
    };
    world.register(
        SystemDescriptor{ id: RENDER_PIPELINE_SYSTEM_ID, name: "Render Pipeline", deps: vec![ RENDER_SYSTEM_ID, RENDER_TARGET_SYSTEM_ID ] },
        pipeline_system,
    ).unwrap_or_else(|err| panic!("Could not register render pipeline system: {}", err));

    // The passes exist; the GPU loop may start
    if let Err(err) = render_thread.spawn() {
        error!("Could not start render thread: {}", err);
        std::process::exit(1);
    }

    // Enter the main loop
    info!("Initialization complete; entering game loop...");
    let mut last_tick = Instant::now();
    event_loop.run(move |event, _, control_flow| {
        // Switch on the event type
        match event {
            | Event::WindowEvent{ window_id: _window_id, event } => {
                // Match the event again
                match event {
                    | WindowEvent::CloseRequested => {
                        // Stop the GPU loop, then save the pipeline cache while the device is still up
                        render_thread.stop();
                        render_system.borrow().persist_pipeline_cache();
                        *control_flow = ControlFlow::Exit;
                    },

                    | WindowEvent::Resized(size) => {
                        // The render thread rebuilds the swapchain at this size once it goes out-of-date
                        render_thread.set_window_extent(size.width, size.height);
                    },

                    // Ignore the others
                    _ => {}
                }
            },

            | Event::MainEventsCleared => {
                // Service a pending resize handshake before preparing the next frame
                if render_thread.swapchain_resized() {
                    let pipeline = world.get(RENDER_PIPELINE_SYSTEM_ID).expect("Render pipeline system disappeared from the world");
                    let mut pipeline = pipeline.borrow_mut();
                    let pipeline: &mut dyn System = &mut *pipeline;
                    let pipeline: &mut RenderPipelineSystem = pipeline.as_any_mut().downcast_mut::<RenderPipelineSystem>().expect("Render pipeline system has an unexpected type");
                    if let Err(err) = pipeline.on_swapchain_resize() {
                        error!("Could not adjust to resized swapchain: {}", err);
                        render_thread.stop();
                        *control_flow = ControlFlow::Exit;
                        return;
                    }
                    render_system.borrow_mut().reset_frame_idx();
                    render_thread.ack_resize();
                }

                // Run the world for one frame
                let delta = last_tick.elapsed().as_secs_f32();
                last_tick = Instant::now();
                if let Err(err) = world.tick(delta) {
                    error!("{}", err);
                    render_thread.stop();
                    *control_flow = ControlFlow::Exit;
                }
            },

            // We do nothing for all other events
            _ => {}
        }
    });
}
