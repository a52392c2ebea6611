//! Recording backend for state machine tests.

use std::cell::{Ref, RefCell};
use std::rc::Rc;

use crate::resource::{AcquireRequest, AudioBackend, AudioHandle, ResourceError, Ticket};
use crate::types::ParagraphId;

#[derive(Debug, Default)]
pub(crate) struct MockLog {
    pub acquired: Vec<AcquireRequest>,
    pub released: Vec<Ticket>,
    pub played: Vec<Ticket>,
    pub live: usize,
    pub max_live: usize,
    pub refuse_play: bool,
}

impl MockLog {
    pub fn acquired_ids(&self) -> Vec<ParagraphId> {
        self.acquired.iter().map(|r| r.paragraph_id).collect()
    }
}

#[derive(Debug, Default, Clone)]
pub(crate) struct MockBackend {
    log: Rc<RefCell<MockLog>>,
}

impl MockBackend {
    pub fn log(&self) -> Ref<'_, MockLog> {
        self.log.borrow()
    }

    pub fn refuse_play(&mut self, refuse: bool) {
        self.log.borrow_mut().refuse_play = refuse;
    }

    pub fn last_ticket(&self) -> Ticket {
        self.log
            .borrow()
            .acquired
            .last()
            .map(|r| r.ticket)
            .expect("nothing acquired")
    }
}

impl AudioBackend for MockBackend {
    type Handle = MockHandle;

    fn acquire(&mut self, request: AcquireRequest) -> MockHandle {
        let ticket = request.ticket;
        let mut log = self.log.borrow_mut();
        log.acquired.push(request);
        log.live += 1;
        log.max_live = log.max_live.max(log.live);
        MockHandle {
            ticket,
            log: self.log.clone(),
            released: false,
        }
    }
}

#[derive(Debug)]
pub(crate) struct MockHandle {
    ticket: Ticket,
    log: Rc<RefCell<MockLog>>,
    released: bool,
}

impl AudioHandle for MockHandle {
    fn ticket(&self) -> Ticket {
        self.ticket
    }

    fn play(&mut self) -> Result<(), ResourceError> {
        let mut log = self.log.borrow_mut();
        if log.refuse_play {
            return Err(ResourceError::Refused("autoplay blocked".into()));
        }
        log.played.push(self.ticket);
        Ok(())
    }

    fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        let mut log = self.log.borrow_mut();
        log.released.push(self.ticket);
        log.live -= 1;
    }
}
