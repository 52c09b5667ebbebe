//! Frame scheduling
//!
//! [`FrameScheduler`] walks a ring of N frame slots. Each frame waits on its
//! slot's fence, acquires a swapchain image, waits on whichever slot still
//! guards that image, records, submits and presents. Swapchain recreation and
//! shader reloads are deferred requests consumed after present. The GPU work
//! itself is behind [`FrameBackend`] so the ordering can be exercised without
//! a device.

use crate::render::vulkan::{VulkanError, VulkanResult};
use crate::render::window::WindowSurface;
use ash::vk;
use bitflags::bitflags;

bitflags! {
    /// Work deferred until the current frame has been presented
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PendingRequests: u8 {
        /// Rebuild the swapchain and everything sized by it
        const RECREATE_SWAPCHAIN = 1 << 0;
        /// Rebuild the pipeline from the shader files on disk
        const RELOAD_SHADERS = 1 << 1;
    }
}

/// Result of acquiring a swapchain image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireOutcome {
    /// An image is available; `suboptimal` asks for a rebuild after this frame
    Acquired {
        /// Index of the acquired image
        image_index: u32,
        /// Surface no longer matches the swapchain exactly
        suboptimal: bool,
    },
    /// The swapchain can no longer be used
    OutOfDate,
}

/// Result of presenting an image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresentOutcome {
    /// Presented as-is
    Presented,
    /// Presented, but the swapchain should be rebuilt
    Suboptimal,
    /// Not presented; the swapchain must be rebuilt
    OutOfDate,
}

/// The frame between `begin_frame` and `end_frame`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActiveFrame {
    /// Frame slot in the ring
    pub slot: usize,
    /// Acquired swapchain image
    pub image_index: u32,
    /// Frames completed before this one
    pub frame_number: u64,
}

/// GPU side of the frame loop
pub trait FrameBackend {
    /// Number of swapchain images
    fn image_count(&self) -> usize;

    /// Block until the slot's last submission completed
    fn wait_for_slot(&mut self, slot: usize) -> VulkanResult<()>;

    /// Acquire an image, signaling the slot's image-available semaphore
    fn acquire_image(&mut self, slot: usize) -> VulkanResult<AcquireOutcome>;

    /// Write per-image uniforms before recording
    fn update_frame_uniforms(&mut self, slot: usize, image_index: u32) -> VulkanResult<()>;

    /// Begin the slot's command buffer and render pass on the image
    fn begin_recording(&mut self, slot: usize, image_index: u32) -> VulkanResult<()>;

    /// End the render pass and command buffer
    fn end_recording(&mut self, slot: usize) -> VulkanResult<()>;

    /// Reset the slot's fence and submit its command buffer
    fn submit(&mut self, slot: usize) -> VulkanResult<()>;

    /// Present the image once the slot's rendering finished
    fn present(&mut self, slot: usize, image_index: u32) -> VulkanResult<PresentOutcome>;

    /// Wait idle, then rebuild the swapchain and its dependents at `extent`
    fn recreate_swapchain(&mut self, extent: vk::Extent2D) -> VulkanResult<()>;

    /// Wait idle, then rebuild the pipeline from shader files
    fn reload_shaders(&mut self) -> VulkanResult<()>;
}

/// Block on window events until the framebuffer has a non-zero area
pub fn wait_for_nonzero_extent<W: WindowSurface + ?Sized>(window: &mut W) -> vk::Extent2D {
    let (mut width, mut height) = window.framebuffer_size();
    if width == 0 || height == 0 {
        log::debug!("Framebuffer has zero area, waiting for events");
    }
    while width == 0 || height == 0 {
        window.wait_events();
        (width, height) = window.framebuffer_size();
    }
    vk::Extent2D { width, height }
}

/// Frame ring state machine
#[derive(Debug)]
pub struct FrameScheduler {
    frames_in_flight: usize,
    current_slot: usize,
    images_in_flight: Vec<Option<usize>>,
    active: Option<ActiveFrame>,
    pending: PendingRequests,
    frame_number: u64,
}

impl FrameScheduler {
    /// Scheduler for `frames_in_flight` slots over `image_count` images
    pub fn new(frames_in_flight: usize, image_count: usize) -> VulkanResult<Self> {
        if frames_in_flight == 0 {
            return Err(VulkanError::invalid("at least one frame in flight is required"));
        }

        Ok(Self {
            frames_in_flight,
            current_slot: 0,
            images_in_flight: vec![None; image_count],
            active: None,
            pending: PendingRequests::empty(),
            frame_number: 0,
        })
    }

    /// Start a frame
    ///
    /// Returns `None` when the swapchain was out of date; it has been rebuilt
    /// and nothing was recorded, so the caller skips drawing this iteration.
    pub fn begin_frame<B, W>(&mut self, backend: &mut B, window: &mut W) -> VulkanResult<Option<ActiveFrame>>
    where
        B: FrameBackend + ?Sized,
        W: WindowSurface + ?Sized,
    {
        if self.active.is_some() {
            return Err(VulkanError::invalid("begin_frame called while a frame is active"));
        }

        let slot = self.current_slot;
        backend.wait_for_slot(slot)?;

        let image_index = match backend.acquire_image(slot)? {
            AcquireOutcome::Acquired { image_index, suboptimal } => {
                if suboptimal {
                    self.pending.insert(PendingRequests::RECREATE_SWAPCHAIN);
                }
                image_index
            }
            AcquireOutcome::OutOfDate => {
                self.recreate(backend, window)?;
                return Ok(None);
            }
        };

        let image = image_index as usize;
        let guard = self
            .images_in_flight
            .get(image)
            .copied()
            .ok_or_else(|| VulkanError::invalid(format!("acquired image {image} outside the swapchain")))?;
        if let Some(guarding_slot) = guard {
            if guarding_slot != slot {
                backend.wait_for_slot(guarding_slot)?;
            }
        }
        self.images_in_flight[image] = Some(slot);

        backend.update_frame_uniforms(slot, image_index)?;
        backend.begin_recording(slot, image_index)?;

        let frame = ActiveFrame {
            slot,
            image_index,
            frame_number: self.frame_number,
        };
        self.active = Some(frame);
        Ok(Some(frame))
    }

    /// Finish, submit and present the active frame, then handle deferred requests
    pub fn end_frame<B, W>(&mut self, backend: &mut B, window: &mut W) -> VulkanResult<()>
    where
        B: FrameBackend + ?Sized,
        W: WindowSurface + ?Sized,
    {
        let frame = self
            .active
            .take()
            .ok_or_else(|| VulkanError::invalid("end_frame called without an active frame"))?;

        backend.end_recording(frame.slot)?;
        backend.submit(frame.slot)?;
        let outcome = backend.present(frame.slot, frame.image_index)?;

        self.current_slot = (self.current_slot + 1) % self.frames_in_flight;
        self.frame_number += 1;

        if window.take_resized() || outcome != PresentOutcome::Presented {
            self.pending.insert(PendingRequests::RECREATE_SWAPCHAIN);
        }

        if self.pending.contains(PendingRequests::RECREATE_SWAPCHAIN) {
            // Rebuilding the swapchain rebuilds the pipeline from disk as well.
            self.recreate(backend, window)?;
        } else if self.pending.contains(PendingRequests::RELOAD_SHADERS) {
            self.pending.remove(PendingRequests::RELOAD_SHADERS);
            backend.reload_shaders()?;
            log::info!("Shaders reloaded");
        }

        Ok(())
    }

    fn recreate<B, W>(&mut self, backend: &mut B, window: &mut W) -> VulkanResult<()>
    where
        B: FrameBackend + ?Sized,
        W: WindowSurface + ?Sized,
    {
        let extent = wait_for_nonzero_extent(window);
        // The rebuild uses the current size, so a resize seen so far is handled.
        window.take_resized();
        backend.recreate_swapchain(extent)?;

        self.images_in_flight = vec![None; backend.image_count()];
        self.pending
            .remove(PendingRequests::RECREATE_SWAPCHAIN | PendingRequests::RELOAD_SHADERS);

        log::info!("Swapchain recreated at {}x{}", extent.width, extent.height);
        Ok(())
    }

    /// Defer work until after the next present
    pub fn request(&mut self, requests: PendingRequests) {
        self.pending.insert(requests);
    }

    /// Requests not yet consumed
    pub fn pending(&self) -> PendingRequests {
        self.pending
    }

    /// Frame between begin and end, if any
    pub fn active(&self) -> Option<ActiveFrame> {
        self.active
    }

    /// Slot the next frame will use
    pub fn current_slot(&self) -> usize {
        self.current_slot
    }

    /// Number of slots in the ring
    pub fn frames_in_flight(&self) -> usize {
        self.frames_in_flight
    }

    /// Slot whose fence guards `image_index`
    pub fn image_guard(&self, image_index: usize) -> Option<usize> {
        self.images_in_flight.get(image_index).copied().flatten()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{HashSet, VecDeque};

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Event {
        Wait(usize),
        Acquire(usize, Option<u32>),
        Uniforms(usize, u32),
        Begin(usize, u32),
        End(usize),
        Submit(usize),
        Present(usize, u32),
        Recreate(u32, u32),
        Reload,
    }

    struct MockBackend {
        images: usize,
        images_after_recreate: usize,
        next_image: u32,
        acquire_script: VecDeque<AcquireOutcome>,
        present_script: VecDeque<PresentOutcome>,
        outstanding: HashSet<usize>,
        max_outstanding: usize,
        events: Vec<Event>,
    }

    impl MockBackend {
        fn new(images: usize) -> Self {
            Self {
                images,
                images_after_recreate: images,
                next_image: 0,
                acquire_script: VecDeque::new(),
                present_script: VecDeque::new(),
                outstanding: HashSet::new(),
                max_outstanding: 0,
                events: Vec::new(),
            }
        }

        fn position(&self, event: Event) -> usize {
            self.events
                .iter()
                .position(|e| *e == event)
                .unwrap_or_else(|| panic!("{event:?} not recorded in {:?}", self.events))
        }

        fn last_position(&self, event: Event) -> usize {
            self.events
                .iter()
                .rposition(|e| *e == event)
                .unwrap_or_else(|| panic!("{event:?} not recorded in {:?}", self.events))
        }
    }

    impl FrameBackend for MockBackend {
        fn image_count(&self) -> usize {
            self.images
        }

        fn wait_for_slot(&mut self, slot: usize) -> VulkanResult<()> {
            self.outstanding.remove(&slot);
            self.events.push(Event::Wait(slot));
            Ok(())
        }

        fn acquire_image(&mut self, slot: usize) -> VulkanResult<AcquireOutcome> {
            let outcome = self.acquire_script.pop_front().unwrap_or_else(|| {
                let image_index = self.next_image % self.images as u32;
                self.next_image += 1;
                AcquireOutcome::Acquired {
                    image_index,
                    suboptimal: false,
                }
            });
            let image = match outcome {
                AcquireOutcome::Acquired { image_index, .. } => Some(image_index),
                AcquireOutcome::OutOfDate => None,
            };
            self.events.push(Event::Acquire(slot, image));
            Ok(outcome)
        }

        fn update_frame_uniforms(&mut self, slot: usize, image_index: u32) -> VulkanResult<()> {
            self.events.push(Event::Uniforms(slot, image_index));
            Ok(())
        }

        fn begin_recording(&mut self, slot: usize, image_index: u32) -> VulkanResult<()> {
            assert!(
                !self.outstanding.contains(&slot),
                "slot {slot} re-recorded while its work is outstanding"
            );
            self.events.push(Event::Begin(slot, image_index));
            Ok(())
        }

        fn end_recording(&mut self, slot: usize) -> VulkanResult<()> {
            self.events.push(Event::End(slot));
            Ok(())
        }

        fn submit(&mut self, slot: usize) -> VulkanResult<()> {
            self.outstanding.insert(slot);
            self.max_outstanding = self.max_outstanding.max(self.outstanding.len());
            self.events.push(Event::Submit(slot));
            Ok(())
        }

        fn present(&mut self, slot: usize, image_index: u32) -> VulkanResult<PresentOutcome> {
            self.events.push(Event::Present(slot, image_index));
            Ok(self.present_script.pop_front().unwrap_or(PresentOutcome::Presented))
        }

        fn recreate_swapchain(&mut self, extent: vk::Extent2D) -> VulkanResult<()> {
            self.outstanding.clear();
            self.images = self.images_after_recreate;
            self.next_image = 0;
            self.events.push(Event::Recreate(extent.width, extent.height));
            Ok(())
        }

        fn reload_shaders(&mut self) -> VulkanResult<()> {
            self.outstanding.clear();
            self.events.push(Event::Reload);
            Ok(())
        }
    }

    struct MockWindow {
        size: (u32, u32),
        upcoming: VecDeque<(u32, u32)>,
        resized: bool,
        waits: usize,
    }

    impl MockWindow {
        fn new(width: u32, height: u32) -> Self {
            Self {
                size: (width, height),
                upcoming: VecDeque::new(),
                resized: false,
                waits: 0,
            }
        }
    }

    impl WindowSurface for MockWindow {
        fn framebuffer_size(&self) -> (u32, u32) {
            self.size
        }

        fn take_resized(&mut self) -> bool {
            std::mem::take(&mut self.resized)
        }

        fn wait_events(&mut self) {
            self.waits += 1;
            if let Some(size) = self.upcoming.pop_front() {
                self.size = size;
            }
        }
    }

    fn run_frame(scheduler: &mut FrameScheduler, backend: &mut MockBackend, window: &mut MockWindow) -> Option<ActiveFrame> {
        let frame = scheduler.begin_frame(backend, window).unwrap();
        if frame.is_some() {
            scheduler.end_frame(backend, window).unwrap();
        }
        frame
    }

    #[test]
    fn outstanding_frames_never_exceed_ring_size() {
        for (frames_in_flight, images) in [(1, 2), (2, 3), (3, 3), (2, 5)] {
            let mut scheduler = FrameScheduler::new(frames_in_flight, images).unwrap();
            let mut backend = MockBackend::new(images);
            let mut window = MockWindow::new(800, 600);

            for _ in 0..32 {
                run_frame(&mut scheduler, &mut backend, &mut window);
                assert!(backend.outstanding.len() <= frames_in_flight);
            }
            assert_eq!(backend.max_outstanding, frames_in_flight);
        }
    }

    #[test]
    fn slots_advance_round_robin() {
        let mut scheduler = FrameScheduler::new(2, 3).unwrap();
        let mut backend = MockBackend::new(3);
        let mut window = MockWindow::new(800, 600);

        let slots: Vec<usize> = (0..5)
            .map(|_| run_frame(&mut scheduler, &mut backend, &mut window).unwrap().slot)
            .collect();
        assert_eq!(slots, vec![0, 1, 0, 1, 0]);
    }

    #[test]
    fn third_frame_waits_for_first_frames_fence_before_reusing_slot() {
        let mut scheduler = FrameScheduler::new(2, 3).unwrap();
        let mut backend = MockBackend::new(3);
        let mut window = MockWindow::new(800, 600);

        run_frame(&mut scheduler, &mut backend, &mut window);
        run_frame(&mut scheduler, &mut backend, &mut window);
        assert_eq!(backend.outstanding, HashSet::from([0, 1]));

        let third = scheduler.begin_frame(&mut backend, &mut window).unwrap().unwrap();
        assert_eq!(third.slot, 0);
        assert_eq!(third.image_index, 2);
        assert_eq!(third.frame_number, 2);

        let first_submit = backend.position(Event::Submit(0));
        let reuse_wait = backend.last_position(Event::Wait(0));
        let reuse_begin = backend.position(Event::Begin(0, 2));
        assert!(first_submit < reuse_wait);
        assert!(reuse_wait < reuse_begin);
        assert!(backend.outstanding.contains(&1));
    }

    #[test]
    fn third_frame_reacquiring_first_image_waits_once_on_slot_zero() {
        let mut scheduler = FrameScheduler::new(2, 2).unwrap();
        let mut backend = MockBackend::new(2);
        let mut window = MockWindow::new(800, 600);

        let first = run_frame(&mut scheduler, &mut backend, &mut window).unwrap();
        let second = run_frame(&mut scheduler, &mut backend, &mut window).unwrap();
        assert_eq!((first.slot, first.image_index), (0, 0));
        assert_eq!((second.slot, second.image_index), (1, 1));
        assert_eq!(scheduler.image_guard(0), Some(0));

        let events_before_third = backend.events.len();
        let third = scheduler.begin_frame(&mut backend, &mut window).unwrap().unwrap();
        assert_eq!((third.slot, third.image_index, third.frame_number), (0, 0, 2));

        let third_events = &backend.events[events_before_third..];
        assert_eq!(
            third_events,
            [
                Event::Wait(0),
                Event::Acquire(0, Some(0)),
                Event::Uniforms(0, 0),
                Event::Begin(0, 0),
            ]
        );
        assert!(backend.position(Event::Submit(0)) < events_before_third);
        assert_eq!(backend.outstanding, HashSet::from([1]));
        assert_eq!(scheduler.image_guard(0), Some(0));
    }

    #[test]
    fn image_held_by_another_slot_waits_on_that_slots_fence() {
        let mut scheduler = FrameScheduler::new(2, 3).unwrap();
        let mut backend = MockBackend::new(3);
        let mut window = MockWindow::new(800, 600);
        backend.acquire_script = VecDeque::from([
            AcquireOutcome::Acquired { image_index: 0, suboptimal: false },
            AcquireOutcome::Acquired { image_index: 1, suboptimal: false },
            AcquireOutcome::Acquired { image_index: 1, suboptimal: false },
        ]);

        run_frame(&mut scheduler, &mut backend, &mut window);
        run_frame(&mut scheduler, &mut backend, &mut window);
        assert_eq!(scheduler.image_guard(1), Some(1));

        let frame = scheduler.begin_frame(&mut backend, &mut window).unwrap().unwrap();
        assert_eq!(frame.slot, 0);

        let acquire = backend.last_position(Event::Acquire(0, Some(1)));
        let guard_wait = backend.last_position(Event::Wait(1));
        let begin = backend.position(Event::Begin(0, 1));
        assert!(acquire < guard_wait && guard_wait < begin);
        assert!(backend.outstanding.is_empty());
        assert_eq!(scheduler.image_guard(1), Some(0));
    }

    #[test]
    fn image_guarded_by_own_slot_is_not_waited_twice() {
        let mut scheduler = FrameScheduler::new(1, 2).unwrap();
        let mut backend = MockBackend::new(2);
        let mut window = MockWindow::new(800, 600);
        backend.acquire_script = VecDeque::from([
            AcquireOutcome::Acquired { image_index: 0, suboptimal: false },
            AcquireOutcome::Acquired { image_index: 0, suboptimal: false },
        ]);

        run_frame(&mut scheduler, &mut backend, &mut window);
        backend.events.clear();
        scheduler.begin_frame(&mut backend, &mut window).unwrap();

        let waits = backend.events.iter().filter(|e| matches!(e, Event::Wait(_))).count();
        assert_eq!(waits, 1);
    }

    #[test]
    fn out_of_date_acquire_aborts_frame_and_recreates() {
        let mut scheduler = FrameScheduler::new(2, 3).unwrap();
        let mut backend = MockBackend::new(3);
        let mut window = MockWindow::new(1024, 768);
        backend.images_after_recreate = 4;
        backend.acquire_script = VecDeque::from([AcquireOutcome::OutOfDate]);

        let frame = scheduler.begin_frame(&mut backend, &mut window).unwrap();

        assert!(frame.is_none());
        assert!(scheduler.active().is_none());
        assert_eq!(scheduler.current_slot(), 0);
        assert!(backend.events.contains(&Event::Recreate(1024, 768)));
        assert!(!backend.events.iter().any(|e| matches!(e, Event::Begin(..) | Event::Submit(_))));
        assert_eq!(scheduler.images_in_flight.len(), 4);

        let next = run_frame(&mut scheduler, &mut backend, &mut window).unwrap();
        assert_eq!(next.slot, 0);
        assert_eq!(next.frame_number, 0);
    }

    #[test]
    fn resize_handled_by_out_of_date_acquire_is_not_rebuilt_again() {
        let mut scheduler = FrameScheduler::new(2, 3).unwrap();
        let mut backend = MockBackend::new(3);
        let mut window = MockWindow::new(1280, 720);
        window.resized = true;
        backend.acquire_script = VecDeque::from([AcquireOutcome::OutOfDate]);

        assert!(scheduler.begin_frame(&mut backend, &mut window).unwrap().is_none());
        assert!(!window.resized);

        run_frame(&mut scheduler, &mut backend, &mut window).unwrap();
        let rebuilds = backend.events.iter().filter(|e| matches!(e, Event::Recreate(..))).count();
        assert_eq!(rebuilds, 1);
        assert!(scheduler.pending().is_empty());
    }

    #[test]
    fn zero_sized_window_blocks_until_it_has_area() {
        let mut scheduler = FrameScheduler::new(2, 3).unwrap();
        let mut backend = MockBackend::new(3);
        let mut window = MockWindow::new(0, 0);
        window.upcoming = VecDeque::from([(0, 0), (640, 0), (640, 480)]);
        backend.acquire_script = VecDeque::from([AcquireOutcome::OutOfDate]);

        assert!(scheduler.begin_frame(&mut backend, &mut window).unwrap().is_none());

        assert_eq!(window.waits, 3);
        assert_eq!(backend.events.last(), Some(&Event::Recreate(640, 480)));
    }

    #[test]
    fn nonzero_window_does_not_wait_for_events() {
        let mut window = MockWindow::new(320, 200);
        let extent = wait_for_nonzero_extent(&mut window);
        assert_eq!(extent, vk::Extent2D { width: 320, height: 200 });
        assert_eq!(window.waits, 0);
    }

    #[test]
    fn resize_and_stale_present_recreate_after_presenting() {
        let mut scheduler = FrameScheduler::new(2, 3).unwrap();
        let mut backend = MockBackend::new(3);
        let mut window = MockWindow::new(800, 600);

        window.resized = true;
        run_frame(&mut scheduler, &mut backend, &mut window);
        let present = backend.position(Event::Present(0, 0));
        let recreate = backend.position(Event::Recreate(800, 600));
        assert!(present < recreate);

        for outcome in [PresentOutcome::Suboptimal, PresentOutcome::OutOfDate] {
            backend.events.clear();
            backend.present_script.push_back(outcome);
            run_frame(&mut scheduler, &mut backend, &mut window);
            assert_eq!(backend.events.last(), Some(&Event::Recreate(800, 600)));
        }
        assert!(scheduler.pending().is_empty());
    }

    #[test]
    fn suboptimal_acquire_still_renders_then_recreates() {
        let mut scheduler = FrameScheduler::new(2, 3).unwrap();
        let mut backend = MockBackend::new(3);
        let mut window = MockWindow::new(800, 600);
        backend.acquire_script = VecDeque::from([AcquireOutcome::Acquired { image_index: 2, suboptimal: true }]);

        let frame = scheduler.begin_frame(&mut backend, &mut window).unwrap().unwrap();
        assert_eq!(frame.image_index, 2);
        assert!(scheduler.pending().contains(PendingRequests::RECREATE_SWAPCHAIN));

        scheduler.end_frame(&mut backend, &mut window).unwrap();
        assert_eq!(backend.events.last(), Some(&Event::Recreate(800, 600)));
    }

    #[test]
    fn shader_reload_runs_only_after_present() {
        let mut scheduler = FrameScheduler::new(2, 3).unwrap();
        let mut backend = MockBackend::new(3);
        let mut window = MockWindow::new(800, 600);

        scheduler.request(PendingRequests::RELOAD_SHADERS);
        scheduler.begin_frame(&mut backend, &mut window).unwrap();
        assert!(!backend.events.contains(&Event::Reload));

        scheduler.end_frame(&mut backend, &mut window).unwrap();
        assert!(backend.position(Event::Present(0, 0)) < backend.position(Event::Reload));
        assert!(scheduler.pending().is_empty());

        run_frame(&mut scheduler, &mut backend, &mut window);
        assert_eq!(backend.events.iter().filter(|e| **e == Event::Reload).count(), 1);
    }

    #[test]
    fn recreation_absorbs_a_pending_reload() {
        let mut scheduler = FrameScheduler::new(2, 3).unwrap();
        let mut backend = MockBackend::new(3);
        let mut window = MockWindow::new(800, 600);

        scheduler.request(PendingRequests::RELOAD_SHADERS | PendingRequests::RECREATE_SWAPCHAIN);
        run_frame(&mut scheduler, &mut backend, &mut window);

        assert!(backend.events.contains(&Event::Recreate(800, 600)));
        assert!(!backend.events.contains(&Event::Reload));
        assert!(scheduler.pending().is_empty());
    }

    #[test]
    fn frame_calls_must_alternate() {
        let mut scheduler = FrameScheduler::new(2, 3).unwrap();
        let mut backend = MockBackend::new(3);
        let mut window = MockWindow::new(800, 600);

        assert!(matches!(
            scheduler.end_frame(&mut backend, &mut window),
            Err(VulkanError::InvalidOperation { .. })
        ));

        scheduler.begin_frame(&mut backend, &mut window).unwrap();
        assert!(matches!(
            scheduler.begin_frame(&mut backend, &mut window),
            Err(VulkanError::InvalidOperation { .. })
        ));
    }

    #[test]
    fn empty_ring_is_rejected() {
        assert!(FrameScheduler::new(0, 3).is_err());
    }
}
